//! Garage-door-opener service backed by a gate state machine

use crate::handler::{unsupported, AccessoryHandler};
use gw_core::{
    Characteristic, CharacteristicError, CharacteristicResult, CharacteristicValue, ServiceType,
    TargetDoorState,
};
use gw_gate::{GateSnapshot, GateStateMachine};
use tracing::debug;

const CHARACTERISTICS: &[Characteristic] = &[
    Characteristic::Name,
    Characteristic::CurrentDoorState,
    Characteristic::TargetDoorState,
    Characteristic::ObstructionDetected,
];

pub struct GateAccessory {
    gate: GateStateMachine,
}

impl GateAccessory {
    pub fn new(gate: GateStateMachine) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &GateStateMachine {
        &self.gate
    }
}

impl AccessoryHandler for GateAccessory {
    fn service(&self) -> ServiceType {
        ServiceType::GarageDoorOpener
    }

    fn characteristics(&self) -> &'static [Characteristic] {
        CHARACTERISTICS
    }

    fn get(&self, characteristic: Characteristic) -> CharacteristicResult<CharacteristicValue> {
        debug!(gate = %self.gate.name(), %characteristic, "Triggered GET");
        match characteristic {
            Characteristic::Name => Ok(CharacteristicValue::String(self.gate.name().to_string())),
            Characteristic::CurrentDoorState => Ok(self.gate.get_current_state().value().into()),
            Characteristic::TargetDoorState => Ok(self.gate.get_target_state().value().into()),
            Characteristic::ObstructionDetected => Ok(self.gate.get_obstruction_detected().into()),
            other => Err(unsupported(self.service(), other)),
        }
    }

    fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> CharacteristicResult<()> {
        debug!(gate = %self.gate.name(), %characteristic, %value, "Triggered SET");
        match characteristic {
            Characteristic::TargetDoorState => {
                let desired = value
                    .as_u8()
                    .and_then(TargetDoorState::from_value)
                    .ok_or_else(|| CharacteristicError::InvalidValue {
                        characteristic,
                        value: value.to_string(),
                    })?;
                self.gate.set_target_state(desired);
                Ok(())
            }
            c if CHARACTERISTICS.contains(&c) && !c.is_writable() => {
                Err(CharacteristicError::ReadOnly(c))
            }
            other => Err(unsupported(self.service(), other)),
        }
    }

    fn gate_snapshot(&self) -> Option<GateSnapshot> {
        Some(self.gate.snapshot())
    }
}
