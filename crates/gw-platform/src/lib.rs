//! Accessory platform for the remote gateway bridge
//!
//! The platform turns configured devices into accessories the host can
//! publish: gates become garage-door-opener services driven by a
//! [`gw_gate::GateStateMachine`], switches become stateless switch services.
//! It also reconciles the host's accessory cache with the configuration on
//! every discovery pass.

mod accessory;
mod error;
mod gate;
mod handler;
mod host;
mod platform;
mod switch;

pub use accessory::{AccessoryInformation, PlatformAccessory};
pub use error::{PlatformError, PlatformResult};
pub use gate::GateAccessory;
pub use handler::{AccessoryHandler, SharedHandler};
pub use host::{AccessoryHost, LocalHost, SharedHost};
pub use platform::{gate_timings, BridgedAccessory, DiscoverySummary, Platform};
