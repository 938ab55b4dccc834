//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `wallet_debits_total` - Total number of applied debits
//! - `wallet_credits_total` - Total number of applied credits
//! - `wallet_insufficient_funds_total` - Debits rejected on balance
//! - `wallet_duplicate_credits_total` - Credits short-circuited by idempotence
//! - `wallet_invalid_signatures_total` - Payment signatures that failed to verify
//! - `wallet_apply_duration_seconds` - Histogram of mutation latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total applied debits
    pub debits_total: IntCounter,

    /// Total applied credits
    pub credits_total: IntCounter,

    /// Debits rejected for insufficient balance
    pub insufficient_funds_total: IntCounter,

    /// Credits skipped because the payment reference was already applied
    pub duplicate_credits_total: IntCounter,

    /// Payment signatures that failed verification
    pub invalid_signatures_total: IntCounter,

    /// Mutation latency histogram
    pub apply_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let debits_total =
            IntCounter::new("wallet_debits_total", "Total number of applied debits")?;
        registry.register(Box::new(debits_total.clone()))?;

        let credits_total =
            IntCounter::new("wallet_credits_total", "Total number of applied credits")?;
        registry.register(Box::new(credits_total.clone()))?;

        let insufficient_funds_total = IntCounter::new(
            "wallet_insufficient_funds_total",
            "Debits rejected on balance",
        )?;
        registry.register(Box::new(insufficient_funds_total.clone()))?;

        let duplicate_credits_total = IntCounter::new(
            "wallet_duplicate_credits_total",
            "Credits short-circuited by idempotence",
        )?;
        registry.register(Box::new(duplicate_credits_total.clone()))?;

        let invalid_signatures_total = IntCounter::new(
            "wallet_invalid_signatures_total",
            "Payment signatures that failed to verify",
        )?;
        registry.register(Box::new(invalid_signatures_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "wallet_apply_duration_seconds",
                "Histogram of mutation latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        Ok(Self {
            debits_total,
            credits_total,
            insufficient_funds_total,
            duplicate_credits_total,
            invalid_signatures_total,
            apply_duration,
            registry,
        })
    }

    /// Record an applied debit
    pub fn record_debit(&self) {
        self.debits_total.inc();
    }

    /// Record an applied credit
    pub fn record_credit(&self) {
        self.credits_total.inc();
    }

    /// Record an insufficient-funds rejection
    pub fn record_insufficient_funds(&self) {
        self.insufficient_funds_total.inc();
    }

    /// Record a duplicate credit short-circuit
    pub fn record_duplicate_credit(&self) {
        self.duplicate_credits_total.inc();
    }

    /// Record an invalid payment signature
    pub fn record_invalid_signature(&self) {
        self.invalid_signatures_total.inc();
    }

    /// Record mutation duration
    pub fn record_apply_duration(&self, duration_seconds: f64) {
        self.apply_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
