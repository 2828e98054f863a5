//! Balance and history stores
//!
//! The ledger talks to storage only through [`BalanceStore`] and
//! [`HistoryStore`]. Each call is atomic on its own; nothing spans two calls,
//! so the ledger never relies on the store for per-user exclusion.
//!
//! The in-memory implementations can sleep on access to stand in for the
//! latency of a real table, which is what makes contention observable in
//! tests.

use crate::{
    config::StoreConfig,
    error::Result,
    types::{PointHistory, TransactionType, UserId, UserPoint},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Keyed balance table
pub trait BalanceStore: Send + Sync {
    /// Current balance, or `None` if the user was never written
    fn get(&self, user_id: UserId) -> Result<Option<UserPoint>>;

    /// Store `point` for the user and return the stored row with a fresh
    /// timestamp that is never earlier than the previous one for this key
    fn put(&self, user_id: UserId, point: i64) -> Result<UserPoint>;
}

/// Append-only history table
pub trait HistoryStore: Send + Sync {
    /// Append a record and return it with its assigned id
    fn append(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> Result<PointHistory>;

    /// All records of a user in insertion order
    fn all_by_user(&self, user_id: UserId) -> Result<Vec<PointHistory>>;
}

/// In-memory balance table
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    rows: DashMap<UserId, UserPoint>,
    read_latency: Duration,
    write_latency: Duration,
}

impl InMemoryBalanceStore {
    /// Store without artificial latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Store configured from `StoreConfig`
    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            rows: DashMap::new(),
            read_latency: Duration::from_millis(config.read_latency_ms),
            write_latency: Duration::from_millis(config.write_latency_ms),
        }
    }

    /// Number of users with a stored balance
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no balance has been stored
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl BalanceStore for InMemoryBalanceStore {
    fn get(&self, user_id: UserId) -> Result<Option<UserPoint>> {
        simulate_latency(self.read_latency);
        Ok(self.rows.get(&user_id).map(|row| row.value().clone()))
    }

    fn put(&self, user_id: UserId, point: i64) -> Result<UserPoint> {
        simulate_latency(self.write_latency);

        let now = Utc::now();
        let mut row = self.rows.entry(user_id).or_insert_with(|| UserPoint {
            id: user_id,
            point: 0,
            updated_at: now,
        });

        // Wall clock may step backwards; keep per-key timestamps monotonic
        row.updated_at = now.max(row.updated_at);
        row.point = point;

        tracing::trace!(user_id = %user_id, point, "Balance stored");
        Ok(row.value().clone())
    }
}

/// In-memory history table
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: DashMap<UserId, Vec<PointHistory>>,
    next_id: AtomicU64,
}

impl InMemoryHistoryStore {
    /// Empty history table
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all users
    pub fn total_records(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> Result<PointHistory> {
        let record = PointHistory {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            user_id,
            amount,
            kind,
            timestamp,
        };

        // Only this user's shard is write-locked for the push
        self.records.entry(user_id).or_default().push(record.clone());

        tracing::trace!(user_id = %user_id, history_id = record.id, %kind, amount, "History appended");
        Ok(record)
    }

    fn all_by_user(&self, user_id: UserId) -> Result<Vec<PointHistory>> {
        Ok(self
            .records
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        std::thread::sleep(latency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_get_unknown_user_is_none() {
        let store = InMemoryBalanceStore::new();
        assert!(store.get(user(1)).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let store = InMemoryBalanceStore::new();

        let stored = store.put(user(1), 5_000).unwrap();
        assert_eq!(stored.point, 5_000);

        let fetched = store.get(user(1)).unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_timestamps_never_go_backwards() {
        let store = InMemoryBalanceStore::new();

        let first = store.put(user(1), 1_000).unwrap();
        let second = store.put(user(1), 2_000).unwrap();
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_write_latency_applied() {
        let store = InMemoryBalanceStore::with_config(&StoreConfig {
            read_latency_ms: 0,
            write_latency_ms: 20,
        });

        let start = std::time::Instant::now();
        store.put(user(1), 1).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_history_keeps_insertion_order_per_user() {
        let store = InMemoryHistoryStore::new();

        store.append(user(1), 500, TransactionType::Charge, Utc::now()).unwrap();
        store.append(user(2), 700, TransactionType::Charge, Utc::now()).unwrap();
        store.append(user(1), 1_000, TransactionType::Use, Utc::now()).unwrap();
        store.append(user(1), 2_000, TransactionType::Charge, Utc::now()).unwrap();

        let records = store.all_by_user(user(1)).unwrap();
        let amounts: Vec<i64> = records.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![500, 1_000, 2_000]);
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(store.total_records(), 4);
    }

    #[test]
    fn test_concurrent_appends_for_distinct_users() {
        let store = std::sync::Arc::new(InMemoryHistoryStore::new());
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (1..=8)
            .map(|id| {
                let store = std::sync::Arc::clone(&store);
                let barrier = std::sync::Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    for amount in 1..=50 {
                        store
                            .append(user(id), amount, TransactionType::Charge, Utc::now())
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.total_records(), 400);
        let mut ids = Vec::new();
        for id in 1..=8 {
            let records = store.all_by_user(user(id)).unwrap();
            let amounts: Vec<i64> = records.iter().map(|r| r.amount).collect();
            assert_eq!(amounts, (1..=50).collect::<Vec<_>>());
            assert!(records.iter().all(|r| r.user_id == user(id)));
            ids.extend(records.iter().map(|r| r.id));
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
    }

    #[test]
    fn test_history_of_unknown_user_is_empty() {
        let store = InMemoryHistoryStore::new();
        assert!(store.all_by_user(user(42)).unwrap().is_empty());
    }
}
