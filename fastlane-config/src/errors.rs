use std::path::PathBuf;

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadFile(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    ParseFile(PathBuf, toml::de::Error),

    #[error("Invalid address for '{field}': {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("The address hub address is not configured")]
    MissingAddressHub,

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}
