//! Characteristic model exposed to the host
//!
//! Accessories expose a small set of typed characteristics. The host reads
//! and writes them through get/set handlers that always answer with a
//! [`CharacteristicResult`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result type for characteristic handlers
pub type CharacteristicResult<T> = Result<T, CharacteristicError>;

/// Errors reported back to the host from a get/set handler
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CharacteristicError {
    #[error("unknown characteristic: {0}")]
    Unknown(String),

    #[error("{service} does not expose {characteristic}")]
    Unsupported {
        service: ServiceType,
        characteristic: Characteristic,
    },

    #[error("{0} is read-only")]
    ReadOnly(Characteristic),

    #[error("invalid value {value} for {characteristic}")]
    InvalidValue {
        characteristic: Characteristic,
        value: String,
    },
}

/// Service an accessory is exposed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    GarageDoorOpener,
    Switch,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GarageDoorOpener => "GarageDoorOpener",
            Self::Switch => "Switch",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A characteristic of a bridged service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Characteristic {
    Name,
    CurrentDoorState,
    TargetDoorState,
    ObstructionDetected,
    On,
}

impl Characteristic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::CurrentDoorState => "CurrentDoorState",
            Self::TargetDoorState => "TargetDoorState",
            Self::ObstructionDetected => "ObstructionDetected",
            Self::On => "On",
        }
    }

    /// Whether the host may write this characteristic
    pub fn is_writable(self) -> bool {
        matches!(self, Self::TargetDoorState | Self::On)
    }
}

impl FromStr for Characteristic {
    type Err = CharacteristicError;

    /// Accepts both the host names (`TargetDoorState`) and snake_case
    /// (`target_door_state`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Name" | "name" => Ok(Self::Name),
            "CurrentDoorState" | "current_door_state" => Ok(Self::CurrentDoorState),
            "TargetDoorState" | "target_door_state" => Ok(Self::TargetDoorState),
            "ObstructionDetected" | "obstruction_detected" => Ok(Self::ObstructionDetected),
            "On" | "on" => Ok(Self::On),
            other => Err(CharacteristicError::Unknown(other.to_string())),
        }
    }
}

impl TryFrom<String> for Characteristic {
    type Error = CharacteristicError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Characteristic> for String {
    fn from(c: Characteristic) -> String {
        c.as_str().to_string()
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value carried by a characteristic read or write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl CharacteristicValue {
    /// Interpret as a small unsigned enum value; booleans map to 0/1
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::Bool(b) => Some(u8::from(*b)),
            Self::Int(n) => u8::try_from(*n).ok(),
            Self::String(_) => None,
        }
    }

    /// Interpret as a boolean; integers are true when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            Self::String(_) => None,
        }
    }
}

impl From<bool> for CharacteristicValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u8> for CharacteristicValue {
    fn from(n: u8) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<String> for CharacteristicValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
        }
    }
}
