//! Configuration file support for Zenith.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/zenith/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub fasting: FastingConfig,

    #[serde(default)]
    pub breathing: BreathingConfig,

    #[serde(default)]
    pub history: HistoryConfig,
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

/// Fasting timer defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FastingConfig {
    #[serde(default = "default_target_hours")]
    pub default_target_hours: f64,
}

impl Default for FastingConfig {
    fn default() -> Self {
        Self {
            default_target_hours: default_target_hours(),
        }
    }
}

/// Breathing exercise defaults
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct BreathingConfig {
    /// Level used when no persisted record exists yet
    #[serde(default)]
    pub default_level: usize,
}

/// History view parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_chart_days")]
    pub chart_days: u32,

    #[serde(default = "default_chart_max_hours")]
    pub chart_max_hours: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            chart_days: default_chart_days(),
            chart_max_hours: default_chart_max_hours(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("zenith")
}

fn default_target_hours() -> f64 {
    16.0
}

fn default_chart_days() -> u32 {
    7
}

fn default_chart_max_hours() -> f64 {
    24.0
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

    /// Reject values the rest of the system cannot work with
    pub fn validate(&self) -> Result<()> {
        if !crate::types::is_valid_target(self.fasting.default_target_hours) {
            return Err(Error::Config(format!(
                "default_target_hours must be above 0 and at most {}, got {}",
                crate::types::MAX_TARGET_HOURS,
                self.fasting.default_target_hours
            )));
        }
        if crate::breathing::level(self.breathing.default_level).is_none() {
            return Err(Error::Config(format!(
                "default_level {} is outside the level table (0..={})",
                self.breathing.default_level,
                crate::breathing::LEVELS.len() - 1
            )));
        }
        if self.history.chart_days == 0 {
            return Err(Error::Config("chart_days must be at least 1".into()));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("zenith").join("config.toml")
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
