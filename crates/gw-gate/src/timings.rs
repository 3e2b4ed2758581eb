//! Fixed delays that drive the gate state machine

use std::time::Duration;

/// Quiet period after the last position sample before motion is presumed done
pub const SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// How long an obstruction stays asserted after it is detected
pub const OBSTRUCTION_WINDOW: Duration = Duration::from_millis(3000);

/// Gap between the two pulses of a reverse-then-retrigger sequence
pub const PULSE_INTERVAL: Duration = Duration::from_millis(1500);

/// Delays used by one gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateTimings {
    pub settle: Duration,
    pub obstruction_window: Duration,
    pub pulse_interval: Duration,
}

impl Default for GateTimings {
    fn default() -> Self {
        Self {
            settle: SETTLE_DELAY,
            obstruction_window: OBSTRUCTION_WINDOW,
            pulse_interval: PULSE_INTERVAL,
        }
    }
}
