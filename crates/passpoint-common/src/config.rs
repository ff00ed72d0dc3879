//! Runtime configuration for the profile manager
//!
//! All sections carry serde defaults so a partial TOML file is enough.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// ANQP cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// ANQP request settings
    #[serde(default)]
    pub requests: RequestConfig,
    /// Persisted state settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// ANQP cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which a cached entry is evicted by a sweep (milliseconds)
    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: u64,
    /// Interval between background sweeps (milliseconds)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl CacheConfig {
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_ms: default_staleness_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// ANQP request configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Initial hold-off after a request is issued (milliseconds)
    #[serde(default = "default_base_holdoff_ms")]
    pub base_holdoff_ms: u64,
    /// Cap on the hold-off exponent
    #[serde(default = "default_max_holdoff_retries")]
    pub max_holdoff_retries: u32,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            base_holdoff_ms: default_base_holdoff_ms(),
            max_holdoff_retries: default_max_holdoff_retries(),
        }
    }
}

/// Persisted state configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the state file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_staleness_ms() -> u64 {
    60 * 60 * 1000 // 1 hour
}

const fn default_sweep_interval_ms() -> u64 {
    60 * 1000
}

const fn default_base_holdoff_ms() -> u64 {
    10 * 1000
}

const fn default_max_holdoff_retries() -> u32 {
    6
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./passpoint-state.json")
}

fn default_log_level() -> String {
    "info".to_string()
}
