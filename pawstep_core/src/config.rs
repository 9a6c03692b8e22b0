//! Configuration file support for Pawstep.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/pawstep/config.toml`.

use crate::estimation::DEFAULT_RECENT_CAPACITY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub estimation: EstimationConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Estimation engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimationConfig {
    /// Number of recent estimations kept for trends and insights
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// JSON breed catalog replacing the built-in one
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            recent_capacity: default_recent_capacity(),
            catalog_path: None,
        }
    }
}

/// Session machine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_timeout_secs")]
    pub permission_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Restart daily tracking after a walk session stops
    #[serde(default = "default_true")]
    pub resume_daily_after_session: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            permission_timeout_secs: default_timeout_secs(),
            query_timeout_secs: default_timeout_secs(),
            resume_daily_after_session: true,
        }
    }
}

impl TrackingConfig {
    pub fn permission_timeout(&self) -> Duration {
        Duration::from_secs(self.permission_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("pawstep")
}

fn default_recent_capacity() -> usize {
    DEFAULT_RECENT_CAPACITY
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.estimation.recent_capacity == 0 {
            return Err(Error::Config(
                "estimation.recent_capacity must be at least 1".into(),
            ));
        }
        if self.tracking.permission_timeout_secs == 0 || self.tracking.query_timeout_secs == 0 {
            return Err(Error::Config("tracking timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("pawstep").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
