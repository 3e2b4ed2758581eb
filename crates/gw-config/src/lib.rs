//! Configuration loading for the remote gateway bridge
//!
//! The bridge reads `configuration.yaml` from a config directory. Values may
//! use these tags:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_list dir` - Concatenate the lists of every YAML file in a directory
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use gw_config::BridgeConfig;
//!
//! let config = BridgeConfig::load("/etc/gateway")?;
//! for device in &config.devices {
//!     println!("{} ({})", device.display_name, device.device_type);
//! }
//! ```

mod bridge_config;
mod error;
mod loader;
mod secrets;

pub use bridge_config::{ApiConfig, BridgeConfig, TimingsConfig, CONFIG_FILE};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use secrets::Secrets;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
