//! The accessory host collaborator

use crate::accessory::PlatformAccessory;
use dashmap::DashMap;
use gw_core::AccessoryId;
use std::sync::Arc;
use tracing::info;

/// Host that publishes accessories to controllers
pub trait AccessoryHost: Send + Sync {
    fn register_accessories(&self, accessories: &[PlatformAccessory]);

    fn unregister_accessories(&self, accessories: &[PlatformAccessory]);
}

pub type SharedHost = Arc<dyn AccessoryHost>;

/// In-process host that only keeps track of what is registered
///
/// Its contents can be fed back through `Platform::configure_accessory` to
/// simulate a restart with a warm cache.
#[derive(Debug, Default)]
pub struct LocalHost {
    registered: DashMap<AccessoryId, PlatformAccessory>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered accessories, sorted by display name
    pub fn registered(&self) -> Vec<PlatformAccessory> {
        let mut accessories: Vec<_> = self
            .registered
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accessories.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        accessories
    }

    pub fn contains(&self, id: &AccessoryId) -> bool {
        self.registered.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

impl AccessoryHost for LocalHost {
    fn register_accessories(&self, accessories: &[PlatformAccessory]) {
        for accessory in accessories {
            info!(accessory = %accessory.display_name, id = %accessory.id, "Registering accessory");
            self.registered.insert(accessory.id, accessory.clone());
        }
    }

    fn unregister_accessories(&self, accessories: &[PlatformAccessory]) {
        for accessory in accessories {
            if self.registered.remove(&accessory.id).is_some() {
                info!(accessory = %accessory.display_name, id = %accessory.id, "Unregistered accessory");
            }
        }
    }
}
