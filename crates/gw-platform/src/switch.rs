//! Stateless switch service
//!
//! The switch has no real state: reads always say on, and every write is a
//! button press on the relay.

use crate::handler::{unsupported, AccessoryHandler};
use gw_core::{
    Characteristic, CharacteristicError, CharacteristicResult, CharacteristicValue, ServiceType,
    TriggerRequest,
};
use gw_trigger::SharedPublisher;
use tracing::{debug, info};

const CHARACTERISTICS: &[Characteristic] = &[Characteristic::Name, Characteristic::On];

pub struct SwitchAccessory {
    name: String,
    trigger: Option<TriggerRequest>,
    publisher: SharedPublisher,
}

impl SwitchAccessory {
    pub fn new(
        name: impl Into<String>,
        trigger: Option<TriggerRequest>,
        publisher: SharedPublisher,
    ) -> Self {
        Self {
            name: name.into(),
            trigger,
            publisher,
        }
    }

    fn press(&self) {
        info!(switch = %self.name, "Switch {} state", self.name);
        match &self.trigger {
            Some(trigger) => {
                self.publisher.publish(trigger);
            }
            None => debug!(switch = %self.name, "No trigger URL configured, press dropped"),
        }
    }
}

impl AccessoryHandler for SwitchAccessory {
    fn service(&self) -> ServiceType {
        ServiceType::Switch
    }

    fn characteristics(&self) -> &'static [Characteristic] {
        CHARACTERISTICS
    }

    fn get(&self, characteristic: Characteristic) -> CharacteristicResult<CharacteristicValue> {
        debug!(switch = %self.name, %characteristic, "Triggered GET");
        match characteristic {
            Characteristic::Name => Ok(CharacteristicValue::String(self.name.clone())),
            Characteristic::On => Ok(CharacteristicValue::Bool(true)),
            other => Err(unsupported(self.service(), other)),
        }
    }

    fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> CharacteristicResult<()> {
        debug!(switch = %self.name, %characteristic, %value, "Triggered SET");
        match characteristic {
            // Any written value is a press
            Characteristic::On => {
                self.press();
                Ok(())
            }
            c if CHARACTERISTICS.contains(&c) && !c.is_writable() => {
                Err(CharacteristicError::ReadOnly(c))
            }
            other => Err(unsupported(self.service(), other)),
        }
    }
}
