//! Main ledger orchestration layer
//!
//! This module ties together storage, payment verification, and the
//! single-writer actor into the high-level wallet API. Every paid
//! feature calls [`WalletLedger::try_debit`] before performing its
//! action (debit-then-act); the payment webhook calls
//! [`WalletLedger::credit_verified`].
//!
//! # Example
//!
//! ```no_run
//! use wallet_ledger::{Config, Reason, UserId, WalletLedger};
//!
//! #[tokio::main]
//! async fn main() -> wallet_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = WalletLedger::open(config).await?;
//!
//!     let user = UserId::new("u1");
//!     let balance = ledger.get_balance(&user)?;
//!     if balance >= 10 {
//!         let remaining = ledger.try_debit(&user, 10, Reason::FullAnalysis).await?;
//!         // ... perform the paid action only after the debit succeeded
//!         let _ = remaining;
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_wallet_actor, WalletHandle},
    payment::verify_payment_signature,
    types::{CreditOutcome, Reason, UserId, WalletTransaction},
    Config, Error, Metrics, Result, Storage,
};
use std::sync::Arc;
use std::time::Instant;

/// Main wallet ledger interface
pub struct WalletLedger {
    /// Actor handle for mutations
    handle: WalletHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Prometheus metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl WalletLedger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        // Open storage
        let storage = Arc::new(Storage::open(&config)?);

        // Spawn the single-writer actor
        let handle = spawn_wallet_actor(storage.clone(), config.mailbox_capacity);

        let metrics = Metrics::new().map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Current balance; 0 if the wallet does not yet exist
    pub fn get_balance(&self, user_id: &UserId) -> Result<u64> {
        Self::validate_user(user_id)?;

        let balance = self
            .storage
            .get_wallet(user_id)?
            .map(|w| w.balance)
            .unwrap_or(0);

        Ok(balance)
    }

    /// Conditionally deduct `amount` coins from a balance
    ///
    /// The check and the deduction are one serialized step: on success
    /// the new balance is durable before this returns, and the caller
    /// may perform the paid action. On [`Error::InsufficientFunds`]
    /// nothing was mutated and the paid action must not execute.
    pub async fn try_debit(&self, user_id: &UserId, amount: u64, reason: Reason) -> Result<u64> {
        Self::validate_user(user_id)?;
        Self::validate_amount(amount)?;

        let started = Instant::now();
        let result = self.handle.try_debit(user_id.clone(), amount, reason).await;
        self.metrics
            .record_apply_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(_) => self.metrics.record_debit(),
            Err(Error::InsufficientFunds { .. }) => self.metrics.record_insufficient_funds(),
            Err(_) => {}
        }

        result
    }

    /// Credit `amount` coins, idempotent per `payment_reference`
    ///
    /// A replay of an already-applied payment reference is a no-op
    /// reported as [`CreditOutcome::AlreadyCredited`].
    pub async fn credit(
        &self,
        user_id: &UserId,
        amount: u64,
        payment_reference: &str,
        reason: Reason,
    ) -> Result<CreditOutcome> {
        Self::validate_user(user_id)?;
        Self::validate_amount(amount)?;
        if payment_reference.is_empty() {
            return Err(Error::InvalidInput(
                "Payment reference must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let result = self
            .handle
            .credit(
                user_id.clone(),
                amount,
                payment_reference.to_string(),
                reason,
            )
            .await;
        self.metrics
            .record_apply_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(CreditOutcome::Applied { .. }) => self.metrics.record_credit(),
            Ok(CreditOutcome::AlreadyCredited { .. }) => self.metrics.record_duplicate_credit(),
            Err(_) => {}
        }

        result
    }

    /// Verify a payment signature, then credit
    ///
    /// This is the only sanctioned path from a payment webhook to a
    /// balance increase. A failed verification blocks the credit,
    /// mutates nothing, and is logged as a potential security event.
    #[allow(clippy::too_many_arguments)]
    pub async fn credit_verified(
        &self,
        user_id: &UserId,
        amount: u64,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        shared_secret: &str,
        reason: Reason,
    ) -> Result<CreditOutcome> {
        if !verify_payment_signature(order_id, payment_id, signature, shared_secret) {
            tracing::warn!(
                user_id = %user_id,
                order_id,
                payment_id,
                "Invalid payment signature, credit blocked"
            );
            self.metrics.record_invalid_signature();
            return Err(Error::InvalidSignature);
        }

        self.credit(user_id, amount, payment_id, reason).await
    }

    /// Append-only transaction trail for a user, oldest first
    pub fn get_transactions(&self, user_id: &UserId) -> Result<Vec<WalletTransaction>> {
        Self::validate_user(user_id)?;
        self.storage.get_transactions(user_id)
    }

    /// Check the balance reconstruction invariant
    ///
    /// The wallet's current balance must equal the sum of all recorded
    /// deltas. Rejected operations never wrote a transaction, so they
    /// contribute nothing.
    pub fn audit_balance(&self, user_id: &UserId) -> Result<bool> {
        Self::validate_user(user_id)?;

        let balance = self.get_balance(user_id)?;
        let transactions = self.get_transactions(user_id)?;

        let sum: i64 = transactions.iter().map(|tx| tx.delta).sum();

        Ok(i64::try_from(balance).map(|b| b == sum).unwrap_or(false))
    }

    /// Metrics collector (for the metrics endpoint)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration this ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }

    // Input validation

    fn validate_user(user_id: &UserId) -> Result<()> {
        if user_id.is_empty() {
            return Err(Error::InvalidInput("User id must not be empty".to_string()));
        }
        Ok(())
    }

    fn validate_amount(amount: u64) -> Result<()> {
        if amount == 0 || amount > i64::MAX as u64 {
            return Err(Error::InvalidAmount(amount));
        }
        Ok(())
    }
}
