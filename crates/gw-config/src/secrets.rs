//! Secrets loaded from secrets.yaml
//!
//! Relay URLs often embed tokens, so they can live in a separate file that
//! is referenced with `!secret`.

use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Name of the secrets file inside the config directory
pub const SECRETS_FILE: &str = "secrets.yaml";

/// Secret values keyed by name
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
}

impl Secrets {
    /// Load secrets from `<config_dir>/secrets.yaml`
    ///
    /// A missing file is not an error and yields an empty store.
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(SECRETS_FILE);

        if !path.exists() {
            debug!(path = %path.display(), "No secrets file, using empty secrets");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let raw: HashMap<String, serde_yaml::Value> =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                path: path.clone(),
                source: e,
            })?;

        let mut values = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.clone(),
                        reason: "secrets must be scalar values".to_string(),
                    })
                }
            };
            values.insert(key, value);
        }

        debug!(count = values.len(), path = %path.display(), "Loaded secrets");
        Ok(Self { values })
    }

    /// Build a store from in-memory pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a secret by key
    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
