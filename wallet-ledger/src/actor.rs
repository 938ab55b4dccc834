//! Actor-based concurrency for the wallet ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One logical writer task serializes every balance mutation
//! - The read-check-write of a debit happens entirely inside the
//!   actor, so two racing debits can never both observe the same
//!   prior balance (the double-spend failure mode of naive
//!   read-then-write handlers)
//! - Async message passing with backpressure
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              Feature handlers / payment path          │
//! │           Concurrent, independent requests            │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               WalletHandle (Clone)                    │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              WalletActor (Single Task)                │
//! │      read wallet → check → WriteBatch commit          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! A reply is sent only after the storage write returned, so a
//! successful debit means the deduction is durable before the caller
//! performs the paid action.

use crate::types::{CreditOutcome, Reason, UserId, Wallet, WalletTransaction};
use crate::{Error, Result, Storage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the wallet actor
pub enum WalletMessage {
    /// Conditionally deduct from a balance
    TryDebit {
        /// Wallet to debit
        user_id: UserId,
        /// Coins to deduct (> 0)
        amount: u64,
        /// Usage category
        reason: Reason,
        /// New balance on success
        response: oneshot::Sender<Result<u64>>,
    },

    /// Increase a balance, idempotent per payment reference
    Credit {
        /// Wallet to credit
        user_id: UserId,
        /// Coins to add (> 0)
        amount: u64,
        /// External payment event identifier
        payment_reference: String,
        /// Usage category (normally `PaymentCredit`)
        reason: Reason,
        /// Applied or short-circuited outcome
        response: oneshot::Sender<Result<CreditOutcome>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes wallet mutations
pub struct WalletActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<WalletMessage>,
}

impl WalletActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<WalletMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                WalletMessage::Shutdown => break,

                WalletMessage::TryDebit {
                    user_id,
                    amount,
                    reason,
                    response,
                } => {
                    let result = self.handle_try_debit(user_id, amount, reason);
                    let _ = response.send(result);
                }

                WalletMessage::Credit {
                    user_id,
                    amount,
                    payment_reference,
                    reason,
                    response,
                } => {
                    let result = self.handle_credit(user_id, amount, payment_reference, reason);
                    let _ = response.send(result);
                }
            }
        }
    }

    /// Amounts must be positive and representable as a signed delta
    fn validate_amount(amount: u64) -> Result<()> {
        if amount == 0 || amount > i64::MAX as u64 {
            return Err(Error::InvalidAmount(amount));
        }
        Ok(())
    }

    /// Read-check-write for a debit; serialized by the actor loop
    fn handle_try_debit(&self, user_id: UserId, amount: u64, reason: Reason) -> Result<u64> {
        Self::validate_amount(amount)?;

        let now = Utc::now();

        let wallet = self
            .storage
            .get_wallet(&user_id)?
            .unwrap_or_else(|| Wallet::empty(user_id.clone(), now));

        if wallet.balance < amount {
            tracing::debug!(
                user_id = %user_id,
                balance = wallet.balance,
                requested = amount,
                "Debit rejected: insufficient funds"
            );
            return Err(Error::InsufficientFunds {
                balance: wallet.balance,
                requested: amount,
            });
        }

        let new_balance = wallet.balance - amount;

        let tx = WalletTransaction {
            tx_id: Uuid::now_v7(),
            user_id: user_id.clone(),
            delta: -(amount as i64),
            reason,
            timestamp: now,
            payment_reference: None,
        };

        let updated = Wallet {
            user_id,
            balance: new_balance,
            last_transaction_at: now,
            last_reason: reason,
        };

        self.storage.apply_debit(&updated, &tx)?;

        Ok(new_balance)
    }

    /// Idempotent credit; the reference check and the commit are
    /// serialized by the actor loop, so a replayed webhook cannot
    /// slip between them
    fn handle_credit(
        &self,
        user_id: UserId,
        amount: u64,
        payment_reference: String,
        reason: Reason,
    ) -> Result<CreditOutcome> {
        Self::validate_amount(amount)?;

        if self
            .storage
            .lookup_payment_reference(&payment_reference)?
            .is_some()
        {
            let balance = self
                .storage
                .get_wallet(&user_id)?
                .map(|w| w.balance)
                .unwrap_or(0);

            tracing::info!(
                user_id = %user_id,
                payment_reference,
                "Credit skipped: payment reference already applied"
            );
            return Ok(CreditOutcome::AlreadyCredited { balance });
        }

        let now = Utc::now();

        let wallet = self
            .storage
            .get_wallet(&user_id)?
            .unwrap_or_else(|| Wallet::empty(user_id.clone(), now));

        let new_balance = wallet
            .balance
            .checked_add(amount)
            .ok_or(Error::InvalidAmount(amount))?;

        let tx = WalletTransaction {
            tx_id: Uuid::now_v7(),
            user_id: user_id.clone(),
            delta: amount as i64,
            reason,
            timestamp: now,
            payment_reference: Some(payment_reference.clone()),
        };

        let updated = Wallet {
            user_id,
            balance: new_balance,
            last_transaction_at: now,
            last_reason: reason,
        };

        self.storage.apply_credit(&updated, &tx, &payment_reference)?;

        Ok(CreditOutcome::Applied { new_balance })
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct WalletHandle {
    sender: mpsc::Sender<WalletMessage>,
}

impl WalletHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<WalletMessage>) -> Self {
        Self { sender }
    }

    /// Conditionally deduct from a balance
    pub async fn try_debit(&self, user_id: UserId, amount: u64, reason: Reason) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WalletMessage::TryDebit {
                user_id,
                amount,
                reason,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Increase a balance, idempotent per payment reference
    pub async fn credit(
        &self,
        user_id: UserId,
        amount: u64,
        payment_reference: String,
        reason: Reason,
    ) -> Result<CreditOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WalletMessage::Credit {
                user_id,
                amount,
                payment_reference,
                reason,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(WalletMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the wallet actor
pub fn spawn_wallet_actor(storage: Arc<Storage>, mailbox_capacity: usize) -> WalletHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = WalletActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    WalletHandle::new(tx)
}
