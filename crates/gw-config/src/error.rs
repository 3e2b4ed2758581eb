//! Failures raised while building a [`crate::BridgeConfig`]

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why the bridge configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bridge file or one of its includes could not be opened
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid YAML: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A `!secret` tag names a key missing from the secrets file
    #[error("no secret named '{key}'")]
    SecretNotFound { key: String },

    /// An `!include*` argument escapes the config directory or is malformed
    #[error("include '{path}' rejected: {reason}")]
    InvalidIncludePath { path: String, reason: String },

    #[error("include directory {path} does not exist")]
    DirectoryNotFound { path: PathBuf },

    /// A file includes itself, directly or through other files
    #[error("include cycle through {path}")]
    CircularInclude { path: PathBuf },

    /// `!env_var` without a fallback on an unset variable
    #[error("'{var}' is unset and has no fallback")]
    EnvVarNotFound { var: String },

    #[error("bad value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Devices that parse but cannot be bridged together
    #[error("invalid device list: {message}")]
    ValidationFailed { message: String },
}
