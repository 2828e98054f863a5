//! Error types for the point ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// User id is not a positive identifier
    #[error("Invalid user: {0}")]
    InvalidUser(i64),

    /// Requested amount is outside the accepted bounds
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Charge would push the balance over the ceiling
    #[error("Balance exceeds max: {current} + {amount} > {max}")]
    BalanceExceedsMax {
        /// Balance before the attempt
        current: i64,
        /// Requested charge
        amount: i64,
        /// Configured ceiling
        max: i64,
    },

    /// Use amount is larger than the current balance
    #[error("Insufficient balance: {current} < {amount}")]
    InsufficientBalance {
        /// Balance before the attempt
        current: i64,
        /// Requested use
        amount: i64,
    },

    /// No history records exist for the user
    #[error("History not found for user {0}")]
    HistoryNotFound(i64),

    /// Per-user lock was not acquired within the configured wait
    #[error("Lock timeout for user {user_id} after {waited_ms}ms")]
    LockTimeout {
        /// User whose lock was contended
        user_id: i64,
        /// Configured wait bound
        waited_ms: u64,
    },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Concurrency error (blocking task panicked or was cancelled)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Whether the failure was caused by the request rather than the server.
    ///
    /// Client errors are never worth retrying with the same input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidUser(_)
                | Error::InvalidArgument(_)
                | Error::BalanceExceedsMax { .. }
                | Error::InsufficientBalance { .. }
                | Error::HistoryNotFound(_)
        )
    }
}
