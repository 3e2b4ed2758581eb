//! Stable accessory identity derived from a device key

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespace for accessory ids, so the same key always maps to the same id
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_8b2e_4d3a_5f70_9e21_a4c6_d8b0_3e57);

/// Identifies an accessory across process restarts
///
/// The id is a name-based (v5) UUID of the device key, so a device keeps its
/// identity with the host as long as its key does not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessoryId(Uuid);

impl AccessoryId {
    /// Derive the id for a device key
    pub fn from_key(key: &str) -> Self {
        Self(Uuid::new_v5(&ACCESSORY_NAMESPACE, key.as_bytes()))
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for AccessoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
