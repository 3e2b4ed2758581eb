//! Device configuration and outbound trigger requests
//!
//! A [`DeviceConfig`] is immutable once loaded. Runtime state lives with the
//! accessory that was built from it, never on the config itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::AccessoryId;

/// Error for an unsupported HTTP verb in a trigger config
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("trigger method must be GET or POST, got '{0}'")]
pub struct TriggerMethodError(pub String);

/// HTTP verb used for a trigger call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TriggerMethod {
    #[default]
    Get,
    Post,
}

impl TriggerMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl FromStr for TriggerMethod {
    type Err = TriggerMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("GET") {
            Ok(Self::Get)
        } else if s.eq_ignore_ascii_case("POST") {
            Ok(Self::Post)
        } else {
            Err(TriggerMethodError(s.to_string()))
        }
    }
}

impl TryFrom<String> for TriggerMethod {
    type Error = TriggerMethodError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TriggerMethod> for String {
    fn from(method: TriggerMethod) -> String {
        method.as_str().to_string()
    }
}

impl fmt::Display for TriggerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outbound relay call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub url: String,
    pub method: TriggerMethod,
    /// Request body, sent only with POST
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl TriggerRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: TriggerMethod::Get,
            payload: None,
        }
    }

    pub fn post(url: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: TriggerMethod::Post,
            payload: Some(payload.into()),
        }
    }
}

/// Kind of accessory a device is exposed as
///
/// Unrecognised types are kept verbatim so discovery can report and skip them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    Gate,
    Switch,
    Unknown(String),
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gate => "gate",
            Self::Switch => "switch",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for DeviceType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "gate" => Self::Gate,
            "switch" => Self::Switch,
            _ => Self::Unknown(s),
        }
    }
}

impl From<DeviceType> for String {
    fn from(device_type: DeviceType) -> String {
        device_type.as_str().to_string()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of one bridged device
///
/// Field names follow the bridge's snake_case YAML, but the camelCase names
/// used by older plugin configs (`displayName`, `switchUrl`, ...) are
/// accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Name shown by the host
    #[serde(alias = "displayName")]
    pub display_name: String,

    /// Accessory kind
    #[serde(rename = "type")]
    pub device_type: DeviceType,

    /// Position feed channel, also the source of the accessory id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Relay endpoint called on every trigger
    #[serde(
        default,
        alias = "triggerUrl",
        alias = "switchUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub trigger_url: Option<String>,

    #[serde(default, alias = "triggerMethod", alias = "switchReqType")]
    pub trigger_method: TriggerMethod,

    #[serde(
        default,
        alias = "triggerPayload",
        alias = "switchMessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub trigger_payload: Option<String>,
}

impl DeviceConfig {
    /// Create a device with no trigger and no key
    pub fn new(display_name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            display_name: display_name.into(),
            device_type,
            key: None,
            trigger_url: None,
            trigger_method: TriggerMethod::Get,
            trigger_payload: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerRequest) -> Self {
        self.trigger_url = Some(trigger.url);
        self.trigger_method = trigger.method;
        self.trigger_payload = trigger.payload;
        self
    }

    /// The relay call for this device, if a trigger URL is configured
    pub fn trigger(&self) -> Option<TriggerRequest> {
        self.trigger_url.as_ref().map(|url| TriggerRequest {
            url: url.clone(),
            method: self.trigger_method,
            payload: self.trigger_payload.clone(),
        })
    }

    /// Key the accessory id is derived from: the feed key, else the display name
    pub fn identity_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.display_name)
    }

    pub fn accessory_id(&self) -> AccessoryId {
        AccessoryId::from_key(self.identity_key())
    }
}
