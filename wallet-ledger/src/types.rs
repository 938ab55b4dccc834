//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Integral coin arithmetic (no fractional coins exist)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier (externally issued, opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get as bytes (storage key)
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// True when the identifier is empty (rejected by all operations)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Usage category attached to every balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Reason {
    /// Full medical analysis run
    FullAnalysis,
    /// Follow-up chat message
    ChatMessage,
    /// Derived-report tool (diet, chef, exercise, ...)
    ToolUsage,
    /// Credit from a verified payment
    PaymentCredit,
}

impl Reason {
    /// Stable string code (persisted tag)
    pub fn code(&self) -> &'static str {
        match self {
            Reason::FullAnalysis => "full-analysis",
            Reason::ChatMessage => "chat-message",
            Reason::ToolUsage => "tool-usage",
            Reason::PaymentCredit => "payment-credit",
        }
    }

    /// Parse from string code
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full-analysis" => Some(Reason::FullAnalysis),
            "chat-message" => Some(Reason::ChatMessage),
            "tool-usage" => Some(Reason::ToolUsage),
            "payment-credit" => Some(Reason::PaymentCredit),
            _ => None,
        }
    }

    /// Fixed coin tier for usage reasons; `None` for the credit path
    pub fn cost(&self) -> Option<u64> {
        match self {
            Reason::FullAnalysis => Some(10),
            Reason::ChatMessage => Some(1),
            Reason::ToolUsage => Some(2),
            Reason::PaymentCredit => None,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Per-user wallet record
///
/// The balance is `u64`, so a negative balance is unrepresentable.
/// Mutated only through the debit/credit operations; callers never
/// write fields directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Owning user
    pub user_id: UserId,

    /// Current spendable balance (coins)
    pub balance: u64,

    /// Timestamp of the last applied mutation
    pub last_transaction_at: DateTime<Utc>,

    /// Reason tag of the last applied mutation
    pub last_reason: Reason,
}

impl Wallet {
    /// Fresh wallet for a user that has never transacted
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: 0,
            last_transaction_at: now,
            last_reason: Reason::PaymentCredit,
        }
    }
}

/// Immutable transaction record (append-only trail)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub tx_id: Uuid,

    /// Wallet this transaction belongs to
    pub user_id: UserId,

    /// Signed balance change (-amount for debits, +amount for credits)
    pub delta: i64,

    /// Usage category
    pub reason: Reason,

    /// When the mutation was applied
    pub timestamp: DateTime<Utc>,

    /// External payment reference (credits only, idempotence key)
    pub payment_reference: Option<String>,
}

/// Outcome of a credit operation
///
/// A replayed payment reference is not an error: the payment already
/// succeeded from the payer's perspective, so the second application
/// is a no-op reported as `AlreadyCredited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Credit applied; balance after the mutation
    Applied {
        /// Balance after the credit
        new_balance: u64,
    },
    /// Payment reference seen before; balance unchanged
    AlreadyCredited {
        /// Current (unchanged) balance
        balance: u64,
    },
}

impl CreditOutcome {
    /// Balance after the operation, applied or not
    pub fn balance(&self) -> u64 {
        match self {
            CreditOutcome::Applied { new_balance } => *new_balance,
            CreditOutcome::AlreadyCredited { balance } => *balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_round_trip() {
        for reason in [
            Reason::FullAnalysis,
            Reason::ChatMessage,
            Reason::ToolUsage,
            Reason::PaymentCredit,
        ] {
            assert_eq!(Reason::parse(reason.code()), Some(reason));
        }
        assert_eq!(Reason::parse("unknown"), None);
    }

    #[test]
    fn test_reason_tiers() {
        assert_eq!(Reason::FullAnalysis.cost(), Some(10));
        assert_eq!(Reason::ChatMessage.cost(), Some(1));
        assert_eq!(Reason::ToolUsage.cost(), Some(2));
        assert_eq!(Reason::PaymentCredit.cost(), None);
    }

    #[test]
    fn test_empty_wallet() {
        let wallet = Wallet::empty(UserId::new("u1"), Utc::now());
        assert_eq!(wallet.balance, 0);
        assert_eq!(wallet.user_id.as_str(), "u1");
    }

    #[test]
    fn test_credit_outcome_balance() {
        assert_eq!(CreditOutcome::Applied { new_balance: 50 }.balance(), 50);
        assert_eq!(CreditOutcome::AlreadyCredited { balance: 7 }.balance(), 7);
    }
}
