//! Accessories as the host sees and caches them

use gw_core::{AccessoryId, DeviceConfig, MANUFACTURER};
use serde::{Deserialize, Serialize};

/// An accessory known to the host
///
/// This is what survives a restart in the host's cache. The attached device
/// configuration is refreshed from the current config on discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccessory {
    pub id: AccessoryId,
    pub display_name: String,

    /// Device this accessory was created for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceConfig>,
}

impl PlatformAccessory {
    /// Create an accessory for a configured device
    pub fn for_device(device: &DeviceConfig) -> Self {
        Self {
            id: device.accessory_id(),
            display_name: device.display_name.clone(),
            device: Some(device.clone()),
        }
    }

    /// Accessory-information service values
    pub fn information(&self) -> AccessoryInformation {
        let (model, serial_number) = match &self.device {
            Some(device) => (
                device.device_type.as_str().to_string(),
                device.identity_key().to_string(),
            ),
            None => ("unknown".to_string(), self.id.to_string()),
        };

        AccessoryInformation {
            manufacturer: MANUFACTURER.to_string(),
            model,
            serial_number,
        }
    }
}

/// Values of the accessory-information service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInformation {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_core::DeviceType;

    #[test]
    fn test_for_device_uses_key_identity() {
        let device = DeviceConfig::new("Front Gate", DeviceType::Gate).with_key("gate/front");
        let accessory = PlatformAccessory::for_device(&device);

        assert_eq!(accessory.id, AccessoryId::from_key("gate/front"));
        assert_eq!(accessory.display_name, "Front Gate");

        let info = accessory.information();
        assert_eq!(info.manufacturer, MANUFACTURER);
        assert_eq!(info.model, "gate");
        assert_eq!(info.serial_number, "gate/front");
    }

    #[test]
    fn test_information_without_device() {
        let accessory = PlatformAccessory {
            id: AccessoryId::from_key("orphan"),
            display_name: "Orphan".to_string(),
            device: None,
        };

        let info = accessory.information();
        assert_eq!(info.model, "unknown");
        assert_eq!(info.serial_number, accessory.id.to_string());
    }
}
