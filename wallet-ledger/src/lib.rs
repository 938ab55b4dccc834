//! RoboDoc Wallet Ledger
//!
//! Single source of truth for per-user prepaid coin balances, with
//! atomic debit/credit operations and an append-only transaction
//! trail.
//!
//! # Architecture
//!
//! - **Single Writer**: One logical writer task eliminates the
//!   read-then-write double-spend race
//! - **Atomic Commits**: Wallet, transaction, and idempotence marker
//!   land in one RocksDB WriteBatch
//! - **Debit-Then-Act**: Callers deduct before performing the paid
//!   action; a failed debit never yields a free action
//!
//! # Invariants
//!
//! - Balance never goes negative (unrepresentable as `u64`, and the
//!   debit precondition is checked inside the writer)
//! - Balance == Σ deltas of the recorded trail for all time
//! - A payment reference credits a wallet at most once

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod payment;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::WalletLedger;
pub use metrics::Metrics;
pub use payment::{compute_payment_signature, verify_payment_signature};
pub use storage::Storage;
pub use types::{CreditOutcome, Reason, UserId, Wallet, WalletTransaction};
