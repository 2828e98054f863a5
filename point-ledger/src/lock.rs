//! Per-user lock registry
//!
//! Every user id maps to exactly one [`UserLock`], created on first use and
//! kept for the life of the process. Mutations for a user run while holding
//! that user's lock; different users never share a lock, so they never wait
//! on each other.
//!
//! # Fairness
//!
//! The lock is a `parking_lot` mutex released with a fair unlock: the lock is
//! handed directly to the thread that has been parked the longest, so
//! contending callers are served in arrival order and a hot user cannot
//! starve anyone.
//!
//! # Memory
//!
//! Entries are never evicted. The map grows with the number of distinct
//! users that have ever mutated a balance, one small allocation each.

use crate::{types::UserId, Error, Result};
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Exclusive lock for a single user
#[derive(Clone)]
pub struct UserLock {
    user_id: UserId,
    mutex: Arc<Mutex<()>>,
}

impl UserLock {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            mutex: Arc::new(Mutex::new(())),
        }
    }

    /// User this lock belongs to
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Block until the lock is held
    pub fn lock(&self) -> UserLockGuard {
        UserLockGuard {
            user_id: self.user_id,
            guard: Some(self.mutex.lock_arc()),
        }
    }

    /// Block for at most `timeout`
    pub fn try_lock_for(&self, timeout: Duration) -> Option<UserLockGuard> {
        self.mutex.try_lock_arc_for(timeout).map(|guard| UserLockGuard {
            user_id: self.user_id,
            guard: Some(guard),
        })
    }

    /// Whether some thread currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }

    /// Whether both handles refer to the same underlying lock
    pub fn same_as(&self, other: &UserLock) -> bool {
        Arc::ptr_eq(&self.mutex, &other.mutex)
    }
}

impl fmt::Debug for UserLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLock")
            .field("user_id", &self.user_id)
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Held user lock. Released (fairly) on drop.
pub struct UserLockGuard {
    user_id: UserId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl UserLockGuard {
    /// User whose lock is held
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Release the lock now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            ArcMutexGuard::unlock_fair(guard);
            tracing::trace!(user_id = %self.user_id, "User lock released");
        }
    }
}

impl fmt::Debug for UserLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLockGuard")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Registry handing out one lock per user
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<UserId, UserLock>,
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the user's lock, creating it on first access.
    ///
    /// Concurrent first calls for the same user all observe the same lock:
    /// creation goes through the map's entry API, which holds the shard
    /// write lock across the absent-check and the insert.
    pub fn lock_for(&self, user_id: UserId) -> UserLock {
        if let Some(existing) = self.locks.get(&user_id) {
            return existing.value().clone();
        }

        // The entry guard must be dropped before the caller blocks on the
        // user lock, otherwise every user in the same shard would stall.
        self.locks
            .entry(user_id)
            .or_insert_with(|| {
                tracing::debug!(user_id = %user_id, "Created user lock");
                UserLock::new(user_id)
            })
            .value()
            .clone()
    }

    /// Block until the user's lock is held
    pub fn acquire(&self, user_id: UserId) -> UserLockGuard {
        self.lock_for(user_id).lock()
    }

    /// Acquire with an optional bound on the wait
    pub fn acquire_within(
        &self,
        user_id: UserId,
        timeout: Option<Duration>,
    ) -> Result<UserLockGuard> {
        let lock = self.lock_for(user_id);

        match timeout {
            None => Ok(lock.lock()),
            Some(timeout) => lock.try_lock_for(timeout).ok_or_else(|| {
                tracing::warn!(
                    user_id = %user_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for user lock"
                );
                Error::LockTimeout {
                    user_id: user_id.get(),
                    waited_ms: timeout.as_millis() as u64,
                }
            }),
        }
    }

    /// Number of users that have a lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no lock has been created yet
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Instant;

    fn user(id: i64) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_same_user_same_lock() {
        let registry = LockRegistry::new();

        let first = registry.lock_for(user(1));
        let second = registry.lock_for(user(1));
        let other = registry.lock_for(user(2));

        assert!(first.same_as(&second));
        assert!(!first.same_as(&other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_lock() {
        let registry = Arc::new(LockRegistry::new());
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.lock_for(user(99))
                })
            })
            .collect();

        let locks: Vec<UserLock> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(locks.iter().all(|lock| lock.same_as(&locks[0])));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = LockRegistry::new();
        let lock = registry.lock_for(user(1));

        let guard = registry.acquire(user(1));
        assert!(lock.is_locked());
        assert_eq!(guard.user_id(), user(1));

        guard.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_waiters_served_in_arrival_order() {
        let registry = Arc::new(LockRegistry::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let held = registry.acquire(user(1));

        let mut handles = Vec::new();
        for i in 0..5 {
            let registry = Arc::clone(&registry);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let _guard = registry.acquire(user(1));
                order.lock().push(i);
            }));
            // Give each waiter time to park before the next one arrives
            thread::sleep(Duration::from_millis(20));
        }

        held.release();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_acquire_within_times_out() {
        let registry = LockRegistry::new();
        let _held = registry.acquire(user(5));

        let start = Instant::now();
        let result = thread::scope(|s| {
            // Guards are not `Send`; only the outcome leaves the thread
            s.spawn(|| {
                registry
                    .acquire_within(user(5), Some(Duration::from_millis(30)))
                    .map(|_| ())
            })
            .join()
            .unwrap()
        });

        assert!(matches!(
            result,
            Err(Error::LockTimeout { user_id: 5, waited_ms: 30 })
        ));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_different_users_do_not_block() {
        let registry = LockRegistry::new();
        let _held = registry.acquire(user(1));

        let acquired = thread::scope(|s| {
            s.spawn(|| {
                registry
                    .acquire_within(user(2), Some(Duration::from_millis(100)))
                    .is_ok()
            })
            .join()
            .unwrap()
        });

        assert!(acquired);
    }
}
