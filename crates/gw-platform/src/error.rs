//! Error types for the platform

use gw_core::{AccessoryId, CharacteristicError};
use thiserror::Error;

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("accessory not found: {0}")]
    AccessoryNotFound(AccessoryId),

    #[error(transparent)]
    Characteristic(#[from] CharacteristicError),

    #[error("device discovery must run inside a Tokio runtime")]
    NoRuntime,
}
