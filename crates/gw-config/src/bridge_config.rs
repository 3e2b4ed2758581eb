//! The `bridge:` section of configuration.yaml

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;
use gw_core::{AccessoryId, DeviceConfig, DeviceType, DEFAULT_PLATFORM_NAME};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Main configuration file inside the config directory
pub const CONFIG_FILE: &str = "configuration.yaml";

const SECTION: &str = "bridge";

/// Address the HTTP surface binds to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ApiConfig {
    /// `host:port` for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Overrides for the gate timing constants, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingsConfig {
    #[serde(default)]
    pub settle_ms: Option<u64>,

    #[serde(default)]
    pub obstruction_window_ms: Option<u64>,

    #[serde(default)]
    pub pulse_interval_ms: Option<u64>,
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Platform display name
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<TimingsConfig>,

    /// Configured devices, in declaration order
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_name() -> String {
    DEFAULT_PLATFORM_NAME.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8127
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            api: ApiConfig::default(),
            timings: None,
            devices: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate the bridge configuration from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = load_yaml(config_dir.as_ref(), CONFIG_FILE)?;
        let config = Self::from_yaml(&yaml)?;
        config.validate()?;
        debug!(name = %config.name, devices = config.devices.len(), "Loaded bridge configuration");
        Ok(config)
    }

    /// Parse the `bridge:` section of an already expanded document
    ///
    /// A document without the section yields the defaults. No validation is
    /// performed here.
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        let mapping = match yaml {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "root".to_string(),
                    reason: "configuration must be a mapping".to_string(),
                })
            }
        };

        let Some(section) = mapping.get(SECTION) else {
            return Ok(Self::default());
        };
        if section.is_null() {
            return Ok(Self::default());
        }

        serde_yaml::from_value(section.clone()).map_err(|e| ConfigError::InvalidValue {
            key: SECTION.to_string(),
            reason: e.to_string(),
        })
    }

    /// Check cross-device constraints
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen: HashMap<AccessoryId, &str> = HashMap::with_capacity(self.devices.len());

        for (index, device) in self.devices.iter().enumerate() {
            if device.display_name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed {
                    message: format!("device #{} has an empty display_name", index + 1),
                });
            }

            if device.key.as_deref().is_some_and(|key| key.trim().is_empty()) {
                return Err(ConfigError::ValidationFailed {
                    message: format!(
                        "device '{}' has an empty key, remove it or name a feed channel",
                        device.display_name
                    ),
                });
            }

            if let Some(previous) = seen.insert(device.accessory_id(), &device.display_name) {
                return Err(ConfigError::ValidationFailed {
                    message: format!(
                        "devices '{}' and '{}' resolve to the same accessory id (key '{}')",
                        previous,
                        device.display_name,
                        device.identity_key()
                    ),
                });
            }

            match device.device_type {
                DeviceType::Gate if device.key.is_none() => {
                    warn!(device = %device.display_name, "Gate has no key and will never receive positions");
                }
                DeviceType::Gate | DeviceType::Switch => {}
                DeviceType::Unknown(ref kind) => {
                    warn!(device = %device.display_name, kind = %kind, "Unknown device type, it will be skipped");
                }
            }

            if device.trigger_url.is_none() {
                debug!(device = %device.display_name, "Device has no trigger URL");
            }
        }

        Ok(())
    }
}
