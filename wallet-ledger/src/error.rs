//! Error types for the wallet ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB unavailable or failed)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Missing or malformed input (empty user id, bad reference)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Debit/credit amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),

    /// Debit precondition failed; no mutation was applied
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the check
        balance: u64,
        /// Amount the caller asked to debit
        requested: u64,
    },

    /// Payment signature did not verify; crediting was blocked
    #[error("Invalid payment signature")]
    InvalidSignature,

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
