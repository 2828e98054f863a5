//! Point Ledger
//!
//! Per-user point balances with charge/use mutations and an append-only
//! transaction history.
//!
//! # Architecture
//!
//! - **Lock Registry**: one fair lock per user, created on first use
//! - **Per-user serialization**: mutations for one user never interleave
//! - **Independence**: different users never wait on each other
//! - **Injected stores**: balance and history tables behind traits
//!
//! # Invariants
//!
//! - `0 <= balance <= MAX_POINT_BALANCE` before and after every operation
//! - Every successful charge/use appends exactly one history record
//! - Rejected operations write nothing

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod ledger;
pub mod lock;
pub mod error;
pub mod handle;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{PointHistory, TransactionType, UserId, UserPoint};
pub use ledger::PointLedger;
pub use handle::LedgerHandle;
pub use lock::{LockRegistry, UserLock, UserLockGuard};
pub use storage::{BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore};
pub use config::Config;
