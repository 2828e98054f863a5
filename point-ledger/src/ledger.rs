//! Main ledger orchestration layer
//!
//! This module ties together the lock registry and the balance/history
//! stores into the four ledger operations.
//!
//! Every mutation follows the same shape:
//!
//! ```text
//! validate arguments (no lock)
//!   -> acquire user lock
//!      -> read balance -> check bounds -> write balance -> append history
//!   -> release user lock
//! ```
//!
//! A rejected mutation returns before the write, so it leaves no balance
//! change and no history record.
//!
//! # Example
//!
//! ```
//! use point_ledger::{Config, PointLedger};
//!
//! let ledger = PointLedger::in_memory(&Config::default()).unwrap();
//!
//! let balance = ledger.charge(1, 5_000).unwrap();
//! assert_eq!(balance.point, 5_000);
//!
//! let balance = ledger.use_points(1, 1_500).unwrap();
//! assert_eq!(balance.point, 3_500);
//!
//! assert_eq!(ledger.history_of(1).unwrap().len(), 2);
//! ```

use crate::{
    config::{Config, LedgerConfig},
    lock::{LockRegistry, UserLockGuard},
    metrics::Metrics,
    storage::{BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore},
    types::{PointHistory, TransactionType, UserId, UserPoint},
    Error, Result,
};
use std::sync::Arc;
use std::time::Instant;

/// Main ledger interface
///
/// Construct once per process and share it (`Arc<PointLedger>`); the lock
/// registry inside is what serializes mutations per user, so two ledgers
/// over the same stores would not exclude each other.
pub struct PointLedger {
    /// Balance table
    balances: Arc<dyn BalanceStore>,

    /// History table
    history: Arc<dyn HistoryStore>,

    /// One lock per user
    locks: LockRegistry,

    /// Prometheus metrics
    metrics: Metrics,

    /// Bounds and lock behaviour
    config: LedgerConfig,
}

impl PointLedger {
    /// Create a ledger over the given stores
    pub fn new(
        config: LedgerConfig,
        balances: Arc<dyn BalanceStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            balances,
            history,
            locks: LockRegistry::new(),
            metrics: Metrics::new()?,
            config,
        })
    }

    /// Create a ledger backed by in-memory stores
    pub fn in_memory(config: &Config) -> Result<Self> {
        Self::new(
            config.ledger.clone(),
            Arc::new(InMemoryBalanceStore::with_config(&config.store)),
            Arc::new(InMemoryHistoryStore::new()),
        )
    }

    /// Add `amount` points to the user's balance
    pub fn charge(&self, user_id: i64, amount: i64) -> Result<UserPoint> {
        let user_id = self.validate_user(user_id)?;

        if amount < self.config.min_charge_amount || amount > self.config.max_charge_amount {
            self.metrics.record_rejection("invalid_amount");
            return Err(Error::InvalidArgument(format!(
                "charge amount {} outside [{}, {}]",
                amount, self.config.min_charge_amount, self.config.max_charge_amount
            )));
        }

        let _guard = self.lock_user(user_id)?;

        let current = self.current_balance(user_id)?;
        let new_point = current
            .point
            .checked_add(amount)
            .filter(|point| *point <= self.config.max_point_balance);

        let Some(new_point) = new_point else {
            tracing::debug!(
                user_id = %user_id,
                current = current.point,
                amount,
                "Charge rejected: balance would exceed max"
            );
            self.metrics.record_rejection("balance_exceeds_max");
            return Err(Error::BalanceExceedsMax {
                current: current.point,
                amount,
                max: self.config.max_point_balance,
            });
        };

        let updated = self.apply(&current, new_point, amount, TransactionType::Charge)?;
        self.metrics.record_charge();

        Ok(updated)
    }

    /// Spend `amount` points from the user's balance
    pub fn use_points(&self, user_id: i64, amount: i64) -> Result<UserPoint> {
        let user_id = self.validate_user(user_id)?;

        if amount <= 0 {
            self.metrics.record_rejection("invalid_amount");
            return Err(Error::InvalidArgument(format!(
                "use amount must be positive, got {}",
                amount
            )));
        }

        if self.config.enforce_min_use_amount && amount < self.config.min_use_amount {
            self.metrics.record_rejection("invalid_amount");
            return Err(Error::InvalidArgument(format!(
                "use amount {} below minimum {}",
                amount, self.config.min_use_amount
            )));
        }

        let _guard = self.lock_user(user_id)?;

        let current = self.current_balance(user_id)?;

        if current.point < amount {
            tracing::debug!(
                user_id = %user_id,
                current = current.point,
                amount,
                "Use rejected: insufficient balance"
            );
            self.metrics.record_rejection("insufficient_balance");
            return Err(Error::InsufficientBalance {
                current: current.point,
                amount,
            });
        }

        let updated = self.apply(&current, current.point - amount, amount, TransactionType::Use)?;
        self.metrics.record_use();

        Ok(updated)
    }

    /// Current balance, read without the user lock.
    ///
    /// A concurrent mutation may or may not be visible yet, but the value is
    /// always one that was actually stored.
    pub fn balance_of(&self, user_id: i64) -> Result<UserPoint> {
        let user_id = self.validate_user(user_id)?;
        self.current_balance(user_id)
    }

    /// All history records of the user, oldest first.
    ///
    /// A user without any record is reported as `HistoryNotFound`.
    pub fn history_of(&self, user_id: i64) -> Result<Vec<PointHistory>> {
        let records = self.history_or_empty(user_id)?;

        if records.is_empty() {
            return Err(Error::HistoryNotFound(user_id));
        }

        Ok(records)
    }

    /// Like [`history_of`](Self::history_of), but an empty history is `Ok`
    pub fn history_or_empty(&self, user_id: i64) -> Result<Vec<PointHistory>> {
        let user_id = self.validate_user(user_id)?;
        self.history.all_by_user(user_id)
    }

    /// Lock registry (exposed for coordination and tests)
    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn validate_user(&self, raw: i64) -> Result<UserId> {
        UserId::new(raw).map_err(|e| {
            self.metrics.record_rejection("invalid_user");
            e
        })
    }

    fn current_balance(&self, user_id: UserId) -> Result<UserPoint> {
        Ok(self
            .balances
            .get(user_id)?
            .unwrap_or_else(|| UserPoint::empty(user_id)))
    }

    fn lock_user(&self, user_id: UserId) -> Result<UserLockGuard> {
        let start = Instant::now();
        let guard = self.locks.acquire_within(user_id, self.config.lock_timeout());

        self.metrics.record_lock_wait(start.elapsed().as_secs_f64());
        self.metrics.set_user_locks(self.locks.len());

        if guard.is_err() {
            self.metrics.record_rejection("lock_timeout");
        }
        guard
    }

    /// Write the new balance and append its history record.
    ///
    /// Must be called with the user's lock held. If the append fails the
    /// previous balance is written back before the error is returned.
    fn apply(
        &self,
        current: &UserPoint,
        new_point: i64,
        amount: i64,
        kind: TransactionType,
    ) -> Result<UserPoint> {
        let user_id = current.id;
        let updated = self.balances.put(user_id, new_point)?;
        let timestamp = updated.updated_at.max(current.updated_at);

        match self.history.append(user_id, amount, kind, timestamp) {
            Ok(record) => {
                tracing::debug!(
                    user_id = %user_id,
                    %kind,
                    amount,
                    point = updated.point,
                    history_id = record.id,
                    "Balance updated"
                );
                Ok(updated)
            }
            Err(append_err) => {
                tracing::error!(
                    user_id = %user_id,
                    %kind,
                    amount,
                    error = %append_err,
                    "History append failed, restoring previous balance"
                );

                if let Err(restore_err) = self.balances.put(user_id, current.point) {
                    tracing::error!(
                        user_id = %user_id,
                        point = current.point,
                        error = %restore_err,
                        "Failed to restore balance"
                    );
                    return Err(Error::Unexpected(format!(
                        "history append failed ({}) and balance restore failed ({})",
                        append_err, restore_err
                    )));
                }

                Err(append_err)
            }
        }
    }
}

impl std::fmt::Debug for PointLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointLedger")
            .field("locks", &self.locks.len())
            .field("config", &self.config)
            .finish()
    }
}
