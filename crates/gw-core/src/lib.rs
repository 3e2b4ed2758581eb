//! Core types for the remote gateway bridge
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: device configuration, trigger requests, door states, the
//! characteristic model exposed to the host, accessory identity, and
//! position samples.

mod accessory_id;
mod characteristic;
mod device;
mod door_state;
mod position;

pub use accessory_id::AccessoryId;
pub use characteristic::{
    Characteristic, CharacteristicError, CharacteristicResult, CharacteristicValue,
    ServiceType,
};
pub use device::{DeviceConfig, DeviceType, TriggerMethod, TriggerMethodError, TriggerRequest};
pub use door_state::{CurrentDoorState, TargetDoorState};
pub use position::PositionEvent;

/// Manufacturer reported in accessory information
pub const MANUFACTURER: &str = "Remote Gateway";

/// Default display name of the bridge platform
pub const DEFAULT_PLATFORM_NAME: &str = "Remote Gateway";
