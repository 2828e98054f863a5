//! Configuration for the point ledger

use crate::types::{MAX_CHARGE_AMOUNT, MAX_POINT_BALANCE, MIN_CHARGE_AMOUNT, MIN_USE_AMOUNT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Balance rules and locking
    pub ledger: LedgerConfig,

    /// In-memory store behaviour
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "point-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger: LedgerConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Balance bounds and lock behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ceiling for any balance
    pub max_point_balance: i64,

    /// Smallest accepted charge
    pub min_charge_amount: i64,

    /// Largest accepted charge
    pub max_charge_amount: i64,

    /// Smallest accepted use (only checked when `enforce_min_use_amount`)
    pub min_use_amount: i64,

    /// Reject uses below `min_use_amount`
    pub enforce_min_use_amount: bool,

    /// Bounded wait for a user's lock; `None` waits indefinitely
    pub lock_timeout_ms: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_point_balance: MAX_POINT_BALANCE,
            min_charge_amount: MIN_CHARGE_AMOUNT,
            max_charge_amount: MAX_CHARGE_AMOUNT,
            min_use_amount: MIN_USE_AMOUNT,
            enforce_min_use_amount: false,
            lock_timeout_ms: None,
        }
    }
}

impl LedgerConfig {
    /// Lock wait bound as a `Duration`
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Check that the bounds are consistent
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_point_balance <= 0 {
            return Err(crate::Error::Config(
                "max_point_balance must be positive".to_string(),
            ));
        }

        if self.min_charge_amount <= 0 || self.min_charge_amount > self.max_charge_amount {
            return Err(crate::Error::Config(format!(
                "charge bounds are inconsistent: [{}, {}]",
                self.min_charge_amount, self.max_charge_amount
            )));
        }

        if self.max_charge_amount > self.max_point_balance {
            return Err(crate::Error::Config(format!(
                "max_charge_amount {} exceeds max_point_balance {}",
                self.max_charge_amount, self.max_point_balance
            )));
        }

        if self.min_use_amount <= 0 {
            return Err(crate::Error::Config(
                "min_use_amount must be positive".to_string(),
            ));
        }

        if self.lock_timeout_ms == Some(0) {
            return Err(crate::Error::Config(
                "lock_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// In-memory store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Artificial delay added to every balance read (milliseconds)
    pub read_latency_ms: u64,

    /// Artificial delay added to every balance write (milliseconds)
    pub write_latency_ms: u64,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Some(ms) = env_u64("POINT_LEDGER_LOCK_TIMEOUT_MS")? {
            config.ledger.lock_timeout_ms = Some(ms);
        }

        if let Ok(flag) = std::env::var("POINT_LEDGER_ENFORCE_MIN_USE") {
            config.ledger.enforce_min_use_amount = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let Some(ms) = env_u64("POINT_LEDGER_READ_LATENCY_MS")? {
            config.store.read_latency_ms = ms;
        }

        if let Some(ms) = env_u64("POINT_LEDGER_WRITE_LATENCY_MS")? {
            config.store.write_latency_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the bounds are consistent
    pub fn validate(&self) -> crate::Result<()> {
        self.ledger.validate()
    }
}

fn env_u64(name: &str) -> crate::Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| crate::Error::Config(format!("{} is not a number: {}", name, e))),
        Err(_) => Ok(None),
    }
}
