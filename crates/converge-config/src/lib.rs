pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{LifecycleSettings, Settings, TransferSettings};

use std::path::PathBuf;

const APP_DIR: &str = "converge";
const CANDIDATES: [&str; 2] = ["converge.local.yaml", "converge.yaml"];

/// Converge's directory under the user configuration directory, created on
/// first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(APP_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the settings file.
///
/// Search order:
/// 1. `CONVERGE_CONFIG_PATH` environment variable
/// 2. current directory: `converge.local.yaml`, `converge.yaml`
/// 3. `./.converge/`, same names
/// 4. `~/.config/converge/converge.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("CONVERGE_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".converge");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join(APP_DIR).join("converge.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}
