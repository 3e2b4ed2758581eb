//! Door states exposed through the garage door opener service
//!
//! The numeric values are the characteristic encoding the host expects and
//! must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inferred physical state of a gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CurrentDoorState {
    Open = 0,
    #[default]
    Closed = 1,
    Opening = 2,
    Closing = 3,
}

impl CurrentDoorState {
    /// Characteristic value (0=open, 1=closed, 2=opening, 3=closing)
    pub fn value(self) -> u8 {
        self as u8
    }

    /// The end state the door is at or moving toward
    pub fn heading_to(self) -> TargetDoorState {
        match self {
            Self::Open | Self::Opening => TargetDoorState::Open,
            Self::Closed | Self::Closing => TargetDoorState::Closed,
        }
    }

    /// The state a transient state settles into; terminal states are unchanged
    pub fn settled(self) -> Self {
        match self {
            Self::Opening => Self::Open,
            Self::Closing => Self::Closed,
            terminal => terminal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for CurrentDoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired end state of a gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TargetDoorState {
    Open = 0,
    #[default]
    Closed = 1,
}

impl TargetDoorState {
    /// Characteristic value (0=open, 1=closed)
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Parse a characteristic value
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Open),
            1 => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TargetDoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
