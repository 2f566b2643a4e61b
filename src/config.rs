//! Runtime configuration.
//!
//! # Environment Variables
//!
//! - `LEDGER_DB_PATH`: database file (default `ledger.db`)
//! - `LEDGER_BUSY_TIMEOUT_MS`: how long a unit waits for the store lock (default 5000)
//! - `LEDGER_CLEARING_OWNER`: owner key of the clearing account (default `0`)
//! - `LEDGER_CLEARING_CURRENCY`: currency of the clearing account (default `UZS`)

use crate::account::validate_currency;
use crate::bootstrap::{DEFAULT_CLEARING_CURRENCY, DEFAULT_CLEARING_OWNER};
use crate::error::{LedgerError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "ledger.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub database_path: PathBuf,
    pub busy_timeout: Duration,
    pub clearing_owner: String,
    pub clearing_currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            clearing_owner: DEFAULT_CLEARING_OWNER.to_string(),
            clearing_currency: DEFAULT_CLEARING_CURRENCY.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by any `LEDGER_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::default();

        if let Some(path) = lookup("LEDGER_DB_PATH") {
            if path.trim().is_empty() {
                return Err(LedgerError::Config("LEDGER_DB_PATH is empty".to_string()));
            }
            config.database_path = PathBuf::from(path);
        }

        if let Some(ms) = lookup("LEDGER_BUSY_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                LedgerError::Config(format!(
                    "LEDGER_BUSY_TIMEOUT_MS must be a whole number of milliseconds, got '{}'",
                    ms
                ))
            })?;
            config.busy_timeout = Duration::from_millis(ms);
        }

        if let Some(owner) = lookup("LEDGER_CLEARING_OWNER") {
            let owner = owner.trim();
            if owner.is_empty() {
                return Err(LedgerError::Config(
                    "LEDGER_CLEARING_OWNER is empty".to_string(),
                ));
            }
            config.clearing_owner = owner.to_string();
        }

        if let Some(currency) = lookup("LEDGER_CLEARING_CURRENCY") {
            validate_currency(&currency).map_err(|e| {
                LedgerError::Config(format!("LEDGER_CLEARING_CURRENCY: {}", e))
            })?;
            config.clearing_currency = currency;
        }

        Ok(config)
    }

    /// Replaces the database path, e.g. from a command-line flag.
    pub fn with_database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<LedgerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LedgerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.database_path, PathBuf::from("ledger.db"));
        assert_eq!(config.busy_timeout, Duration::from_millis(5000));
        assert_eq!(config.clearing_owner, "0");
        assert_eq!(config.clearing_currency, "UZS");
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(&[
            ("LEDGER_DB_PATH", "/tmp/shop.db"),
            ("LEDGER_BUSY_TIMEOUT_MS", "250"),
            ("LEDGER_CLEARING_OWNER", "system"),
            ("LEDGER_CLEARING_CURRENCY", "USD"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.clearing_owner, "system");
        assert_eq!(config.clearing_currency, "USD");
    }

    #[test]
    fn test_malformed_values_are_config_errors() {
        for vars in [
            [("LEDGER_BUSY_TIMEOUT_MS", "soon")],
            [("LEDGER_CLEARING_CURRENCY", "dollars")],
            [("LEDGER_CLEARING_OWNER", "  ")],
            [("LEDGER_DB_PATH", "")],
        ] {
            let err = from_vars(&vars).unwrap_err();
            assert_eq!(err.code(), "Config", "{:?}", vars);
        }
    }

    #[test]
    fn test_path_override() {
        let config = LedgerConfig::default().with_database_path("other.db");
        assert_eq!(config.database_path, PathBuf::from("other.db"));
    }
}
