//! Configuration module for loading and parsing TOML configuration files.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed client configuration.
    pub client: ClientSection,
    /// Refresh scheduling.
    pub refresh: RefreshConfig,
    /// Display windowing.
    pub display: DisplayConfig,
    /// Expiry cache.
    pub cache: CacheConfig,
    /// Static lot sizes.
    pub lot_sizes: LotSizeConfig,
}

/// Feed client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// Base URL of the feed API.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl ClientSection {
    /// Builds the client configuration for the feed client.
    #[must_use]
    pub fn to_client_config(&self) -> chain_client::ClientConfig {
        chain_client::ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Refresh scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Polling period in milliseconds.
    pub interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl RefreshConfig {
    /// Returns the polling period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Display windowing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Number of strikes rendered around the ATM strike.
    pub window_size: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_size: crate::chain::STRADDLE_WINDOW_SIZE,
        }
    }
}

/// Expiry cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live of cached expiry lists in seconds.
    pub expiry_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    /// Returns the expiry cache time-to-live.
    ///
    /// Values beyond the range of [`chrono::Duration`] saturate; [`Config::parse`]
    /// rejects them.
    #[must_use]
    pub fn expiry_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.expiry_ttl_secs).unwrap_or(chrono::Duration::MAX)
    }
}

/// Static lot size configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LotSizeConfig {
    /// Lot size for symbols with no configured or built-in default.
    pub fallback: u32,
    /// Per-symbol overrides of the built-in defaults.
    pub symbols: HashMap<String, u32>,
}

impl Default for LotSizeConfig {
    fn default() -> Self {
        Self {
            fallback: 1,
            symbols: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Arguments
    /// * `content` - TOML content as string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.client.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "client base_url cannot be empty".to_string(),
            ));
        }
        if self.client.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "client timeout_ms must be positive".to_string(),
            ));
        }
        if self.refresh.interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "refresh interval_ms must be positive".to_string(),
            ));
        }
        if self.display.window_size == 0 {
            return Err(ConfigError::InvalidValue(
                "display window_size must be positive".to_string(),
            ));
        }
        if self.cache.expiry_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "cache expiry_ttl_secs must be positive".to_string(),
            ));
        }
        if chrono::Duration::try_seconds(self.cache.expiry_ttl_secs).is_none() {
            return Err(ConfigError::InvalidValue(
                "cache expiry_ttl_secs out of range".to_string(),
            ));
        }
        if self.lot_sizes.fallback == 0 {
            return Err(ConfigError::InvalidValue(
                "lot_sizes fallback must be positive".to_string(),
            ));
        }
        for (symbol, lot_size) in &self.lot_sizes.symbols {
            if *lot_size == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "lot size for {} must be positive",
                    symbol
                )));
            }
        }

        Ok(())
    }
}
