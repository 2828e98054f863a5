//! Async access to the ledger
//!
//! Ledger mutations park the calling thread while waiting for a user's lock,
//! which must never happen on an async executor thread. [`LedgerHandle`]
//! runs each call on Tokio's blocking pool instead, so async transports can
//! share one ledger with plain threads.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   async callers (transport tasks)    │
//! └──────────────────┬───────────────────┘
//!                    │ LedgerHandle (Clone)
//!                    ▼
//! ┌──────────────────────────────────────┐
//! │      tokio blocking thread pool      │
//! └──────────────────┬───────────────────┘
//!                    │ Arc<PointLedger>
//!                    ▼
//! ┌──────────────────────────────────────┐
//! │  LockRegistry -> stores (per user)   │
//! └──────────────────────────────────────┘
//! ```

use crate::{
    types::{PointHistory, UserPoint},
    Error, PointLedger, Result,
};
use std::sync::Arc;

/// Cloneable async handle to a shared ledger
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    ledger: Arc<PointLedger>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(ledger: Arc<PointLedger>) -> Self {
        Self { ledger }
    }

    /// Shared ledger behind this handle
    pub fn ledger(&self) -> &Arc<PointLedger> {
        &self.ledger
    }

    /// Charge points
    pub async fn charge(&self, user_id: i64, amount: i64) -> Result<UserPoint> {
        self.run(move |ledger| ledger.charge(user_id, amount)).await
    }

    /// Use points
    pub async fn use_points(&self, user_id: i64, amount: i64) -> Result<UserPoint> {
        self.run(move |ledger| ledger.use_points(user_id, amount)).await
    }

    /// Get balance
    pub async fn balance_of(&self, user_id: i64) -> Result<UserPoint> {
        self.run(move |ledger| ledger.balance_of(user_id)).await
    }

    /// Get history
    pub async fn history_of(&self, user_id: i64) -> Result<Vec<PointHistory>> {
        self.run(move |ledger| ledger.history_of(user_id)).await
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PointLedger) -> Result<T> + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);

        tokio::task::spawn_blocking(move || op(&ledger))
            .await
            .map_err(|e| Error::Concurrency(format!("Ledger task failed: {}", e)))?
    }
}
