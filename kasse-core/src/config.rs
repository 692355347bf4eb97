//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "database": "kasse.duckdb",
//!   "debitAmount": 100,
//!   "lowBalanceThreshold": 600,
//!   "pollingIntervalMs": 100,
//!   "registrationTimeoutSecs": 60
//! }
//! ```
//! Every key is optional. `KASSE_*` environment variables override the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

pub const DEFAULT_DATABASE: &str = "kasse.duckdb";
pub const DEFAULT_DEBIT_AMOUNT: i64 = 100;
pub const DEFAULT_LOW_BALANCE_THRESHOLD: i64 = 600;
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 100;
pub const DEFAULT_REGISTRATION_TIMEOUT_SECS: u64 = 60;

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debit_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    low_balance_threshold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    polling_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    registration_timeout_secs: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Kasse configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Database file, relative paths are resolved against the data directory
    pub database: PathBuf,
    /// Minor units charged per swipe
    pub debit_amount: i64,
    /// Pre-charge balance below which a successful swipe warns
    pub low_balance_threshold: i64,
    pub polling_interval: Duration,
    pub registration_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            debit_amount: DEFAULT_DEBIT_AMOUNT,
            low_balance_threshold: DEFAULT_LOW_BALANCE_THRESHOLD,
            polling_interval: Duration::from_millis(DEFAULT_POLLING_INTERVAL_MS),
            registration_timeout: Duration::from_secs(DEFAULT_REGISTRATION_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load config from the data directory, applying `KASSE_*` overrides
    pub fn load(data_dir: &Path) -> Result<Self> {
        Self::load_with_env(data_dir, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] with an explicit environment lookup
    pub fn load_with_env(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        let defaults = Config::default();

        let config = Self {
            database: env("KASSE_DATABASE")
                .map(PathBuf::from)
                .or(raw.database)
                .unwrap_or(defaults.database),
            debit_amount: env_override(&env, "KASSE_DEBIT_AMOUNT")?
                .or(raw.debit_amount)
                .unwrap_or(defaults.debit_amount),
            low_balance_threshold: env_override(&env, "KASSE_LOW_BALANCE_THRESHOLD")?
                .or(raw.low_balance_threshold)
                .unwrap_or(defaults.low_balance_threshold),
            polling_interval: env_override(&env, "KASSE_POLLING_INTERVAL_MS")?
                .or(raw.polling_interval_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.polling_interval),
            registration_timeout: env_override(&env, "KASSE_REGISTRATION_TIMEOUT_SECS")?
                .or(raw.registration_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.registration_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.debit_amount <= 0 {
            return Err(Error::Config(format!(
                "debitAmount must be positive, got {}",
                self.debit_amount
            )));
        }
        if self.low_balance_threshold < 0 {
            return Err(Error::Config(format!(
                "lowBalanceThreshold must not be negative, got {}",
                self.low_balance_threshold
            )));
        }
        if self.polling_interval.is_zero() {
            return Err(Error::Config("pollingIntervalMs must be positive".to_string()));
        }
        if self.registration_timeout.is_zero() {
            return Err(Error::Config(
                "registrationTimeoutSecs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute location of the database file
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            data_dir.join(&self.database)
        }
    }

    /// Save config to the data directory
    /// Preserves settings this crate does not manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir)?;

        settings.database = Some(self.database.clone());
        settings.debit_amount = Some(self.debit_amount);
        settings.low_balance_threshold = Some(self.low_balance_threshold);
        settings.polling_interval_ms = Some(self.polling_interval.as_millis() as u64);
        settings.registration_timeout_secs = Some(self.registration_timeout.as_secs());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))
}

fn env_override<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match env(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", key, value))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.debit_amount, 100);
        assert_eq!(config.low_balance_threshold, 600);
        assert_eq!(config.database_path(dir.path()), dir.path().join("kasse.duckdb"));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"debitAmount": 150, "lowBalanceThreshold": 1000}"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), |key| match key {
            "KASSE_DEBIT_AMOUNT" => Some("250".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.debit_amount, 250);
        assert_eq!(config.low_balance_threshold, 1000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_with_env(dir.path(), |key| match key {
            "KASSE_DEBIT_AMOUNT" => Some("0".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::load_with_env(dir.path(), |key| match key {
            "KASSE_POLLING_INTERVAL_MS" => Some("fast".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"displayName": "Kasse 1", "debitAmount": 150}"#,
        )
        .unwrap();

        let mut config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.registration_timeout = Duration::from_secs(30);
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap())
                .unwrap();
        assert_eq!(saved["displayName"], "Kasse 1");
        assert_eq!(saved["debitAmount"], 150);
        assert_eq!(saved["registrationTimeoutSecs"], 30);

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(reloaded, config);
    }
}
