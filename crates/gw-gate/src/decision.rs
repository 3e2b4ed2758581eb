//! How many relay pulses it takes to reach a target state
//!
//! One pulse toggles the door's motion. A door already at or moving toward
//! the target needs nothing; a door at rest on the other side needs one
//! pulse; a door moving away from the target needs two (reverse, then
//! re-trigger once it has settled).

use gw_core::{CurrentDoorState, TargetDoorState};

/// Number of pulses needed to move from `current` toward `desired`
pub fn pulses_needed(desired: TargetDoorState, current: CurrentDoorState) -> u8 {
    use CurrentDoorState as Current;

    match (desired, current) {
        (TargetDoorState::Closed, Current::Open) => 1,
        (TargetDoorState::Closed, Current::Opening) => 2,
        (TargetDoorState::Closed, Current::Closed | Current::Closing) => 0,
        (TargetDoorState::Open, Current::Closed) => 1,
        (TargetDoorState::Open, Current::Closing) => 2,
        (TargetDoorState::Open, Current::Open | Current::Opening) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CurrentDoorState::*;

    #[test]
    fn test_close_decisions() {
        assert_eq!(pulses_needed(TargetDoorState::Closed, Open), 1);
        assert_eq!(pulses_needed(TargetDoorState::Closed, Opening), 2);
        assert_eq!(pulses_needed(TargetDoorState::Closed, Closed), 0);
        assert_eq!(pulses_needed(TargetDoorState::Closed, Closing), 0);
    }

    #[test]
    fn test_open_decisions() {
        assert_eq!(pulses_needed(TargetDoorState::Open, Closed), 1);
        assert_eq!(pulses_needed(TargetDoorState::Open, Closing), 2);
        assert_eq!(pulses_needed(TargetDoorState::Open, Open), 0);
        assert_eq!(pulses_needed(TargetDoorState::Open, Opening), 0);
    }
}
