//! Tunable settings
//!
//! ```yaml
//! lifecycle:
//!   create_timeout_ms: 300000
//!   poll_interval_ms: 5000
//! transfer:
//!   max_parallel: 4
//! ```
//!
//! Every key is optional; missing keys take their default.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub lifecycle: LifecycleSettings,
    pub transfer: TransferSettings,
}

/// Timeouts and polling of the instance lifecycle, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleSettings {
    pub create_timeout_ms: u64,
    pub start_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub destroy_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub create_initial_delay_ms: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            create_timeout_ms: 600_000,
            start_timeout_ms: 300_000,
            stop_timeout_ms: 300_000,
            destroy_timeout_ms: 300_000,
            poll_interval_ms: 5_000,
            create_initial_delay_ms: 15_000,
        }
    }
}

impl LifecycleSettings {
    pub fn create_timeout(&self) -> Duration {
        Duration::from_millis(self.create_timeout_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_millis(self.destroy_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn create_initial_delay(&self) -> Duration {
        Duration::from_millis(self.create_initial_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferSettings {
    /// Requested worker count; the engine caps it at 10
    pub max_parallel: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self { max_parallel: 4 }
    }
}

impl Settings {
    /// Read and validate the settings at `path`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load the discovered settings file, or the defaults when there is none.
    ///
    /// Returns the file the settings came from, if any.
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        match crate::find_settings_file() {
            Ok(path) => Ok((Self::from_file(&path)?, Some(path))),
            Err(ConfigError::SettingsFileNotFound) => Ok((Self::default(), None)),
            Err(e) => Err(e),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lifecycle.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "lifecycle.poll_interval_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.transfer.max_parallel == 0 {
            return Err(ConfigError::Invalid {
                key: "transfer.max_parallel".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Invalid {
            key: "*".to_string(),
            message: e.to_string(),
        })
    }
}
