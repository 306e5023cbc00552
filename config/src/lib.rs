//! # Configuration Management for shopcache
//!
//! Centralized configuration for the cache layer and the change-notification
//! feed. Per-key-class settings live under `[cache.key_classes.<class>]`.
//!
//! ## TOML File Configuration
//! ```toml
//! [cache]
//! default_ttl_ms = 300000
//! sweep_interval_ms = 60000
//!
//! [cache.key_classes.suppliers]
//! ttl_ms = 900000
//!
//! [cache.key_classes.products]
//! ttl_ms = 300000
//! depends_on = ["brands", "suppliers"]
//!
//! [signal]
//! channel_capacity = 256
//! dedup_window = 1024
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from SHOPCACHE_CONFIG or ./shopcache.toml
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./shopcache.toml";
const CONFIG_PATH_VAR: &str = "SHOPCACHE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub signal: SignalConfig,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL used for key classes without their own entry
    pub default_ttl_ms: u64,
    /// Interval of the expired-entry sweeper, 0 disables it
    #[serde(default)]
    pub sweep_interval_ms: u64,
    /// Per-key-class settings, keyed by entity class name
    #[serde(default)]
    pub key_classes: BTreeMap<String, KeyClassConfig>,
}

/// Settings for one key class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyClassConfig {
    pub ttl_ms: u64,
    /// Entity classes whose changes also invalidate this class
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Change-notification feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Buffered events per subscriber before it starts lagging
    pub channel_capacity: usize,
    /// Number of recent event ids remembered for duplicate detection
    pub dedup_window: usize,
}

impl AppConfig {
    /// Load configuration from the TOML file named in `.env` or the default path
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(err.into());
            }
        }

        if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified as {} or in {} file",
                CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH
            )))
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Class names are checked by the cache layer, which owns the set of
    /// known entity classes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.default_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache default_ttl_ms must be greater than 0".to_string(),
            ));
        }
        for (class, settings) in &self.cache.key_classes {
            if settings.ttl_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "Cache ttl_ms for key class '{}' must be greater than 0",
                    class
                )));
            }
        }

        if self.signal.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Signal channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.signal.dedup_window == 0 {
            return Err(ConfigError::Invalid(
                "Signal dedup_window must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl CacheConfig {
    /// Create a new cache configuration without per-class overrides
    pub fn new(default_ttl_ms: u64, sweep_interval_ms: u64) -> Self {
        Self {
            default_ttl_ms,
            sweep_interval_ms,
            key_classes: BTreeMap::new(),
        }
    }

    pub fn with_key_class(mut self, class: &str, settings: KeyClassConfig) -> Self {
        self.key_classes.insert(class.to_string(), settings);
        self
    }

    /// TTL configured for a class, falling back to the default
    pub fn ttl_for(&self, class: &str) -> Duration {
        let ttl_ms = self
            .key_classes
            .get(class)
            .map(|settings| settings.ttl_ms)
            .unwrap_or(self.default_ttl_ms);
        Duration::from_millis(ttl_ms)
    }

    /// Sweeper interval, `None` when disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        // Reference data changes rarely; billing data more often.
        Self::new(300_000, 60_000)
            .with_key_class("suppliers", KeyClassConfig::new(900_000))
            .with_key_class("brands", KeyClassConfig::new(900_000))
            .with_key_class("customers", KeyClassConfig::new(600_000))
            .with_key_class(
                "products",
                KeyClassConfig::new(300_000).depends_on(&["brands", "suppliers"]),
            )
            .with_key_class(
                "invoices",
                KeyClassConfig::new(120_000).depends_on(&["customers", "products"]),
            )
            .with_key_class(
                "projects",
                KeyClassConfig::new(300_000).depends_on(&["customers"]),
            )
    }
}

impl KeyClassConfig {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, classes: &[&str]) -> Self {
        self.depends_on = classes.iter().map(|c| c.to_string()).collect();
        self
    }
}

impl SignalConfig {
    /// Create a new signal configuration
    pub fn new(channel_capacity: usize, dedup_window: usize) -> Self {
        Self {
            channel_capacity,
            dedup_window,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::new(256, 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [cache]
        default_ttl_ms = 60000
        sweep_interval_ms = 0

        [cache.key_classes.suppliers]
        ttl_ms = 900000

        [cache.key_classes.products]
        ttl_ms = 300000
        depends_on = ["brands", "suppliers"]

        [signal]
        channel_capacity = 16
        dedup_window = 32
    "#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.cache.ttl_for("suppliers"), Duration::from_secs(900));
        assert_eq!(config.cache.ttl_for("products"), Duration::from_secs(300));
        // falls back to the default
        assert_eq!(config.cache.ttl_for("brands"), Duration::from_secs(60));
        assert_eq!(
            config.cache.key_classes["products"].depends_on,
            vec!["brands".to_string(), "suppliers".to_string()]
        );
        assert_eq!(config.cache.sweep_interval(), None);
        assert_eq!(config.signal.channel_capacity, 16);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let toml = r#"
            [cache]
            default_ttl_ms = 1000

            [cache.key_classes.customers]
            ttl_ms = 0
        "#;

        match AppConfig::from_toml_str(toml) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("customers")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_default_ttl_rejected() {
        let mut config = AppConfig::default();
        config.cache.default_ttl_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.signal.dedup_window, 1024);
        assert_eq!(config.cache.ttl_for("suppliers"), Duration::from_millis(900_000));
        assert_eq!(config.cache.sweep_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cache.default_ttl_ms, 60000);
    }
}
