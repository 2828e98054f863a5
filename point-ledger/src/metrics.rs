//! Metrics collection for observability
//!
//! Prometheus metrics for the point ledger. Each [`Metrics`] owns its own
//! registry, so several ledgers (or tests) can coexist in one process.
//!
//! # Metrics
//!
//! - `point_ledger_charges_total` - Successful charges
//! - `point_ledger_uses_total` - Successful uses
//! - `point_ledger_rejections_total{reason}` - Rejected mutations
//! - `point_ledger_lock_wait_seconds` - Time spent waiting for a user lock
//! - `point_ledger_user_locks` - Users with a lock in the registry

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful charges
    pub charges_total: IntCounter,

    /// Successful uses
    pub uses_total: IntCounter,

    /// Rejected mutations by reason
    pub rejections_total: IntCounterVec,

    /// Lock wait histogram
    pub lock_wait: Histogram,

    /// Live user locks
    pub user_locks: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("charges_total", &self.charges_total.get())
            .field("uses_total", &self.uses_total.get())
            .field("user_locks", &self.user_locks.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let charges_total =
            IntCounter::new("point_ledger_charges_total", "Successful charges")?;
        registry.register(Box::new(charges_total.clone()))?;

        let uses_total = IntCounter::new("point_ledger_uses_total", "Successful uses")?;
        registry.register(Box::new(uses_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("point_ledger_rejections_total", "Rejected mutations"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let lock_wait = Histogram::with_opts(
            HistogramOpts::new(
                "point_ledger_lock_wait_seconds",
                "Time spent waiting for a user lock",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(lock_wait.clone()))?;

        let user_locks = IntGauge::new("point_ledger_user_locks", "Users with a lock")?;
        registry.register(Box::new(user_locks.clone()))?;

        Ok(Self {
            charges_total,
            uses_total,
            rejections_total,
            lock_wait,
            user_locks,
            registry,
        })
    }

    /// Record a successful charge
    pub fn record_charge(&self) {
        self.charges_total.inc();
    }

    /// Record a successful use
    pub fn record_use(&self) {
        self.uses_total.inc();
    }

    /// Record a rejected mutation
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Record time spent waiting for a lock
    pub fn record_lock_wait(&self, duration_seconds: f64) {
        self.lock_wait.observe(duration_seconds);
    }

    /// Update live lock count
    pub fn set_user_locks(&self, count: usize) {
        self.user_locks.set(count as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode_text(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Unexpected(e.to_string()))
    }
}
