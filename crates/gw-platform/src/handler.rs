//! Characteristic handlers bound to an accessory

use gw_core::{
    Characteristic, CharacteristicError, CharacteristicResult, CharacteristicValue, ServiceType,
};
use gw_gate::GateSnapshot;
use std::sync::Arc;

/// Answers the host's characteristic reads and writes for one accessory
///
/// Handlers never block on I/O and every call returns exactly one result.
pub trait AccessoryHandler: Send + Sync {
    /// Service this accessory exposes
    fn service(&self) -> ServiceType;

    /// Characteristics the service carries
    fn characteristics(&self) -> &'static [Characteristic];

    fn get(&self, characteristic: Characteristic) -> CharacteristicResult<CharacteristicValue>;

    fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> CharacteristicResult<()>;

    /// Side-effect free view of gate state, for gates only
    fn gate_snapshot(&self) -> Option<GateSnapshot> {
        None
    }
}

pub type SharedHandler = Arc<dyn AccessoryHandler>;

/// Error for a characteristic the service does not carry
pub(crate) fn unsupported(
    service: ServiceType,
    characteristic: Characteristic,
) -> CharacteristicError {
    CharacteristicError::Unsupported {
        service,
        characteristic,
    }
}
