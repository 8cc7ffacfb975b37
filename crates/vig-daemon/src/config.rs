//! Configuration file management.
//!
//! All configuration is read once at startup from
//! `$VIG_DATA_DIR/config.toml`; there is no hot reload.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Betting-ledger indexer settings.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Query API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Decay-scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Weight-emission settings.
    #[serde(default)]
    pub emission: EmissionConfig,
    /// Ingestion settings.
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Ledger indexer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Indexer endpoint URL.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// Per-fetch deadline; a fetch past it is cancelled and counted as
    /// failed for that cycle.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Worker-pool bound for concurrent per-address fetches.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,
}

/// Query API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

/// Decay-scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Length of the decay window in days.
    #[serde(default = "default_decay_window")]
    pub decay_window_days: u64,
    /// Per-day-offset weights in percent, entry 0 = today.
    #[serde(default = "default_weights_pct")]
    pub weights_pct: Vec<u64>,
}

/// Weight-emission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Emission cadence in target-network blocks.
    #[serde(default = "default_cadence_blocks")]
    pub cadence_blocks: u64,
    /// Target network block time in seconds.
    #[serde(default = "default_block_time")]
    pub block_time_secs: u64,
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Seconds between ingestion cycles.
    #[serde(default = "default_ingestion_interval")]
    pub interval_secs: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_endpoint_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_concurrent_fetches() -> u32 {
    8
}

fn default_listen_address() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8091
}

fn default_decay_window() -> u64 {
    vig_types::DECAY_WINDOW_DAYS
}

fn default_weights_pct() -> Vec<u64> {
    vig_scoring::decay::DECAY_WEIGHTS_PCT.to_vec()
}

fn default_cadence_blocks() -> u64 {
    360
}

fn default_block_time() -> u64 {
    12
}

fn default_ingestion_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decay_window_days: default_decay_window(),
            weights_pct: default_weights_pct(),
        }
    }
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            cadence_blocks: default_cadence_blocks(),
            block_time_secs: default_block_time(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_ingestion_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scoring.decay_window_days == 0 {
            anyhow::bail!("scoring.decay_window_days must be at least 1");
        }
        if self.scoring.weights_pct.len() != self.scoring.decay_window_days as usize {
            anyhow::bail!(
                "scoring.weights_pct must have {} entries, found {}",
                self.scoring.decay_window_days,
                self.scoring.weights_pct.len()
            );
        }
        if self.emission.cadence_blocks == 0 || self.emission.block_time_secs == 0 {
            anyhow::bail!("emission cadence and block time must be nonzero");
        }
        if self.ledger.max_concurrent_fetches == 0 {
            anyhow::bail!("ledger.max_concurrent_fetches must be at least 1");
        }
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("VIG_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Vig")
        }
        #[cfg(target_os = "linux")]
        {
            dirs_fallback(".vig")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Vig")
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            dirs_fallback(".vig")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/vig"))
}
