//! Core types for the point ledger
//!
//! Points are whole numbers, so balances and amounts are plain `i64`.
//! Signed integers let out-of-range requests (zero, negative) reach
//! validation instead of being unrepresentable at the call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum balance a user may hold
pub const MAX_POINT_BALANCE: i64 = 1_000_000;

/// Minimum balance a user may hold
pub const MIN_POINT_BALANCE: i64 = 0;

/// Smallest amount accepted by a single charge
pub const MIN_CHARGE_AMOUNT: i64 = 1_000;

/// Largest amount accepted by a single charge
pub const MAX_CHARGE_AMOUNT: i64 = 1_000_000;

/// Smallest amount accepted by a single use, when enforcement is enabled
pub const MIN_USE_AMOUNT: i64 = 1_000;

/// User identifier (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Validate a raw identifier
    pub fn new(raw: i64) -> crate::Result<Self> {
        if raw <= 0 {
            return Err(crate::Error::InvalidUser(raw));
        }
        Ok(Self(raw))
    }

    /// Get the raw identifier
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = crate::Error;

    fn try_from(raw: i64) -> crate::Result<Self> {
        Self::new(raw)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current point balance of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoint {
    /// Owner
    pub id: UserId,

    /// Balance, always within `[MIN_POINT_BALANCE, MAX_POINT_BALANCE]`
    pub point: i64,

    /// Last time the balance was written
    pub updated_at: DateTime<Utc>,
}

impl UserPoint {
    /// Balance of a user that has never been written
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            point: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Kind of balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Points added
    Charge,
    /// Points spent
    Use,
}

impl TransactionType {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Charge => "CHARGE",
            TransactionType::Use => "USE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied charge or use. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointHistory {
    /// Store-assigned sequence number
    pub id: u64,

    /// Owner
    pub user_id: UserId,

    /// Magnitude of the operation (> 0)
    pub amount: i64,

    /// Charge or use
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// When the operation was applied
    pub timestamp: DateTime<Utc>,
}
