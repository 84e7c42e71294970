use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: converge.local.yaml, converge.yaml\n\
        - ./.converge/ directory\n\
        - ~/.config/converge/converge.yaml\n\
        A file can also be given with the CONVERGE_CONFIG_PATH environment variable"
    )]
    SettingsFileNotFound,

    #[error("Cannot parse {path}\nreason: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
