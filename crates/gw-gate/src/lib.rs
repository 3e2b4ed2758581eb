//! Gate state machine for the remote gateway bridge
//!
//! A gate has no end-stop sensors. Its motion is inferred from the stream of
//! raw position samples:
//!
//! ```text
//! sample <  last                    -> Opening
//! sample >= last                    -> Closing
//! no sample for the settle delay    -> Opening becomes Open, Closing becomes Closed
//! ```
//!
//! A reversal from Opening to Closing raises the obstruction flag for a
//! fixed window. User intents are turned into relay pulses according to
//! [`pulses_needed`].

mod decision;
mod timer;
mod timings;

pub use decision::pulses_needed;
pub use timings::{GateTimings, OBSTRUCTION_WINDOW, PULSE_INTERVAL, SETTLE_DELAY};

use chrono::{DateTime, Utc};
use gw_core::{CurrentDoorState, PositionEvent, TargetDoorState, TriggerRequest};
use gw_trigger::SharedPublisher;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use timer::TimerSlot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Mutable state of one gate
#[derive(Debug, Default)]
struct GateRuntimeState {
    last_position: i64,
    last_sample_at: Option<DateTime<Utc>>,
    current: CurrentDoorState,
    target: TargetDoorState,
    obstruction_detected: bool,
    settle_timer: TimerSlot,
    obstruction_timer: TimerSlot,
    pulse_timer: TimerSlot,
}

/// Point-in-time view of a gate, without the side effects of the host reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateSnapshot {
    pub last_position: i64,
    /// When the last sample was received by the feed
    pub last_sample_at: Option<DateTime<Utc>>,
    pub current: CurrentDoorState,
    pub target: TargetDoorState,
    pub obstruction_detected: bool,
    pub settle_pending: bool,
    pub pulse_pending: bool,
}

struct GateInner {
    name: String,
    trigger: Option<TriggerRequest>,
    publisher: SharedPublisher,
    timings: GateTimings,
    state: Mutex<GateRuntimeState>,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, GateRuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Press the remote button once
    fn send_pulse(&self) {
        info!(gate = %self.name, "Switch {} state", self.name);
        match &self.trigger {
            Some(trigger) => {
                self.publisher.publish(trigger);
            }
            None => debug!(gate = %self.name, "No trigger URL configured, pulse dropped"),
        }
    }
}

/// Tracks one gate and drives its relay
///
/// Cloning yields another handle to the same gate. Timers hold only a weak
/// reference, so dropping the last handle cancels everything pending.
///
/// All methods that schedule timers must be called from within a Tokio
/// runtime.
#[derive(Clone)]
pub struct GateStateMachine {
    inner: Arc<GateInner>,
}

impl GateStateMachine {
    /// Create a gate in the Closed/Closed state
    pub fn new(
        name: impl Into<String>,
        trigger: Option<TriggerRequest>,
        publisher: SharedPublisher,
        timings: GateTimings,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                name: name.into(),
                trigger,
                publisher,
                timings,
                state: Mutex::new(GateRuntimeState::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn timings(&self) -> GateTimings {
        self.inner.timings
    }

    /// Feed a new raw position sample
    ///
    /// A sample below the previous one means the door is opening, anything
    /// else means closing. The door is presumed to have stopped once no
    /// sample arrives for the settle delay.
    #[instrument(skip(self), fields(gate = %self.inner.name))]
    pub fn on_position_update(&self, raw_position: i64) {
        self.record_position(raw_position, Utc::now());
    }

    /// Feed a sample from the position feed, keeping its receive time
    #[instrument(skip(self, event), fields(gate = %self.inner.name, key = %event.key))]
    pub fn on_position_event(&self, event: &PositionEvent) {
        self.record_position(event.position, event.received_at);
    }

    fn record_position(&self, raw_position: i64, received_at: DateTime<Utc>) {
        let mut state = self.inner.lock();

        let previous = state.current;
        let next = if raw_position < state.last_position {
            CurrentDoorState::Opening
        } else {
            CurrentDoorState::Closing
        };

        if previous == CurrentDoorState::Opening && next == CurrentDoorState::Closing {
            info!("Direction reversed while opening, flagging obstruction");
            state.obstruction_detected = true;
            let generation = state.obstruction_timer.rearm();
            let handle = self.spawn_after(self.inner.timings.obstruction_window, move |inner| {
                let mut state = inner.lock();
                if state.obstruction_timer.finish(generation) {
                    debug!(gate = %inner.name, "Obstruction window elapsed");
                    state.obstruction_detected = false;
                }
            });
            state.obstruction_timer.set(handle);
        }

        Self::set_current(&self.inner.name, &mut state, next);
        info!("{} -> {} = {}", state.last_position, raw_position, state.current);

        let generation = state.settle_timer.rearm();
        let handle = self.spawn_after(self.inner.timings.settle, move |inner| {
            let mut state = inner.lock();
            if !state.settle_timer.finish(generation) {
                return;
            }
            let settled = state.current.settled();
            debug!(gate = %inner.name, last_position = state.last_position, "Position settled");
            Self::set_current(&inner.name, &mut state, settled);
            state.obstruction_detected = false;
        });
        state.settle_timer.set(handle);

        state.last_position = raw_position;
        state.last_sample_at = Some(received_at);
    }

    /// Read the current door state for the host
    ///
    /// This read also pulls the target toward what the door is doing, so a
    /// door moved by its own remote does not leave a stale target behind.
    pub fn get_current_state(&self) -> CurrentDoorState {
        let mut state = self.inner.lock();
        state.target = state.current.heading_to();
        state.current
    }

    pub fn get_target_state(&self) -> TargetDoorState {
        let state = self.inner.lock();
        debug!(gate = %self.inner.name, target_state = %state.target, "Get target state");
        state.target
    }

    /// Apply a user intent
    ///
    /// Does nothing when `desired` is already the target. Otherwise sends
    /// zero, one or two pulses depending on what the door is doing; see
    /// [`pulses_needed`]. A pending second pulse from an earlier intent is
    /// cancelled first.
    #[instrument(skip(self), fields(gate = %self.inner.name))]
    pub fn set_target_state(&self, desired: TargetDoorState) {
        let pulses = {
            let mut state = self.inner.lock();
            info!(desired = %desired, "Set target state");

            if desired == state.target {
                debug!("Target unchanged");
                return;
            }
            state.target = desired;
            state.pulse_timer.cancel();

            let pulses = pulses_needed(desired, state.current);
            debug!(current = %state.current, pulses, "Pulse decision");

            if pulses == 2 {
                let generation = state.pulse_timer.rearm();
                let handle = self.spawn_after(self.inner.timings.pulse_interval, move |inner| {
                    if inner.lock().pulse_timer.finish(generation) {
                        inner.send_pulse();
                    }
                });
                state.pulse_timer.set(handle);
            }
            pulses
        };

        if pulses > 0 {
            self.inner.send_pulse();
        }
    }

    pub fn get_obstruction_detected(&self) -> bool {
        self.inner.lock().obstruction_detected
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.inner.lock();
        GateSnapshot {
            last_position: state.last_position,
            last_sample_at: state.last_sample_at,
            current: state.current,
            target: state.target,
            obstruction_detected: state.obstruction_detected,
            settle_pending: state.settle_timer.is_pending(),
            pulse_pending: state.pulse_timer.is_pending(),
        }
    }

    fn set_current(name: &str, state: &mut GateRuntimeState, next: CurrentDoorState) {
        if state.current != next {
            info!(gate = %name, "Handle gate state {}", next);
            state.current = next;
        }
    }

    /// Run `apply` after `delay`, unless the gate has been dropped by then
    fn spawn_after<F>(&self, delay: Duration, apply: F) -> JoinHandle<()>
    where
        F: FnOnce(&GateInner) + Send + 'static,
    {
        let weak: Weak<GateInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                apply(&inner);
            }
        })
    }
}

impl std::fmt::Debug for GateStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateStateMachine")
            .field("name", &self.inner.name)
            .field("trigger", &self.inner.trigger)
            .field("timings", &self.inner.timings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_trigger::RecordingPublisher;

    const RELAY_URL: &str = "http://relay.local/gate";

    fn make_gate() -> (Arc<RecordingPublisher>, GateStateMachine) {
        let publisher = Arc::new(RecordingPublisher::new());
        let gate = GateStateMachine::new(
            "Front Gate",
            Some(TriggerRequest::get(RELAY_URL)),
            publisher.clone(),
            GateTimings::default(),
        );
        (publisher, gate)
    }

    async fn advance_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Drive the gate to Open: a falling sample followed by the settle delay
    async fn settle_open(gate: &GateStateMachine) {
        gate.on_position_update(50);
        gate.on_position_update(30);
        advance_ms(2010).await;
        assert_eq!(gate.snapshot().current, CurrentDoorState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let (publisher, gate) = make_gate();

        let snapshot = gate.snapshot();
        assert_eq!(snapshot.current, CurrentDoorState::Closed);
        assert_eq!(snapshot.target, TargetDoorState::Closed);
        assert_eq!(snapshot.last_position, 0);
        assert!(!gate.get_obstruction_detected());
        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falling_sample_means_opening() {
        let (_, gate) = make_gate();

        gate.on_position_update(50);
        assert_eq!(gate.snapshot().current, CurrentDoorState::Closing);

        gate.on_position_update(30);
        assert_eq!(gate.snapshot().current, CurrentDoorState::Opening);
        assert_eq!(gate.snapshot().last_position, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_sample_means_closing() {
        let (_, gate) = make_gate();

        gate.on_position_update(40);
        gate.on_position_update(40);
        assert_eq!(gate.snapshot().current, CurrentDoorState::Closing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opening_settles_to_open_and_syncs_target() {
        let (_, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(30);
        assert_eq!(gate.get_current_state(), CurrentDoorState::Opening);

        advance_ms(1990).await;
        assert_eq!(gate.snapshot().current, CurrentDoorState::Opening);

        advance_ms(20).await;
        assert_eq!(gate.get_current_state(), CurrentDoorState::Open);
        assert_eq!(gate.get_target_state(), TargetDoorState::Open);
        assert!(!gate.snapshot().settle_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_settles_to_closed() {
        let (_, gate) = make_gate();

        gate.on_position_update(10);
        gate.on_position_update(20);
        advance_ms(2010).await;

        assert_eq!(gate.get_current_state(), CurrentDoorState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_sample_supersedes_settle_timer() {
        let (_, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(40);
        for position in [35, 30, 25, 20] {
            advance_ms(1500).await;
            gate.on_position_update(position);
            assert_eq!(gate.snapshot().current, CurrentDoorState::Opening);
        }

        advance_ms(1990).await;
        assert_eq!(gate.snapshot().current, CurrentDoorState::Opening);
        advance_ms(20).await;
        assert_eq!(gate.snapshot().current, CurrentDoorState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reversal_while_opening_flags_obstruction() {
        let (_, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(30);
        gate.on_position_update(40);

        assert_eq!(gate.snapshot().current, CurrentDoorState::Closing);
        assert!(gate.get_obstruction_detected());

        advance_ms(3010).await;
        assert!(!gate.get_obstruction_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reversal_while_closing_is_not_an_obstruction() {
        let (_, gate) = make_gate();

        gate.on_position_update(30);
        gate.on_position_update(50);
        gate.on_position_update(40);

        assert_eq!(gate.snapshot().current, CurrentDoorState::Opening);
        assert!(!gate.get_obstruction_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_obstruction_clears_after_window_while_samples_continue() {
        let (_, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(30);
        gate.on_position_update(40);
        assert!(gate.get_obstruction_detected());

        // Keep the door moving so the settle timer never fires
        for position in [45, 50, 55] {
            advance_ms(900).await;
            gate.on_position_update(position);
        }
        assert!(gate.get_obstruction_detected());

        advance_ms(310).await;
        assert!(!gate.get_obstruction_detected());
        assert_eq!(gate.snapshot().current, CurrentDoorState::Closing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_obstruction_replaces_clear_timer() {
        let (_, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(30);
        gate.on_position_update(40);

        advance_ms(500).await;
        gate.on_position_update(35);
        advance_ms(500).await;
        gate.on_position_update(45);

        for position in [46, 47] {
            advance_ms(1000).await;
            gate.on_position_update(position);
        }
        // First window would have ended at 3.0s; the second runs to 4.0s
        advance_ms(500).await;
        assert!(gate.get_obstruction_detected());
        gate.on_position_update(48);

        advance_ms(600).await;
        assert!(!gate.get_obstruction_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_clears_obstruction() {
        let (_, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(30);
        gate.on_position_update(40);
        assert!(gate.get_obstruction_detected());

        advance_ms(2010).await;
        assert_eq!(gate.snapshot().current, CurrentDoorState::Closed);
        assert!(!gate.get_obstruction_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_from_open_sends_one_pulse() {
        let (publisher, gate) = make_gate();
        settle_open(&gate).await;

        // The host read syncs the target to Open first
        assert_eq!(gate.get_current_state(), CurrentDoorState::Open);
        gate.set_target_state(TargetDoorState::Closed);

        assert_eq!(publisher.count(), 1);
        advance_ms(5000).await;
        assert_eq!(publisher.count(), 1);
        assert_eq!(publisher.published()[0].request.url, RELAY_URL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_opening_sends_two_spaced_pulses() {
        let (publisher, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(30);
        assert_eq!(gate.get_current_state(), CurrentDoorState::Opening);
        assert_eq!(gate.get_target_state(), TargetDoorState::Open);

        gate.set_target_state(TargetDoorState::Closed);
        assert_eq!(publisher.count(), 1);
        assert!(gate.snapshot().pulse_pending);

        advance_ms(1510).await;
        let published = publisher.published();
        assert_eq!(published.len(), 2);
        let gap = published[1].at - published[0].at;
        assert!(gap >= Duration::from_millis(1500));
        assert!(gap < Duration::from_millis(1510));
        assert!(!gate.snapshot().pulse_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_while_closing_sends_two_pulses() {
        let (publisher, gate) = make_gate();

        gate.on_position_update(10);
        gate.on_position_update(20);
        assert_eq!(gate.get_current_state(), CurrentDoorState::Closing);

        gate.set_target_state(TargetDoorState::Open);
        advance_ms(1510).await;
        assert_eq!(publisher.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_from_closed_sends_one_pulse() {
        let (publisher, gate) = make_gate();

        gate.set_target_state(TargetDoorState::Open);
        advance_ms(2000).await;

        assert_eq!(publisher.count(), 1);
        assert_eq!(gate.get_target_state(), TargetDoorState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_target_is_a_no_op() {
        let (publisher, gate) = make_gate();

        gate.set_target_state(TargetDoorState::Closed);
        advance_ms(2000).await;

        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_target_pulses_once() {
        let (publisher, gate) = make_gate();
        settle_open(&gate).await;
        gate.get_current_state();

        gate.set_target_state(TargetDoorState::Closed);
        gate.set_target_state(TargetDoorState::Closed);
        advance_ms(2000).await;

        assert_eq!(publisher.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_toward_motion_sends_nothing() {
        let (publisher, gate) = make_gate();

        // Closing already, target Open then back to Closed
        gate.on_position_update(10);
        gate.on_position_update(20);
        gate.set_target_state(TargetDoorState::Open);
        let after_open = publisher.count();
        gate.set_target_state(TargetDoorState::Closed);

        advance_ms(1510).await;
        // The Closed intent needs no pulse and cancels the pending second one
        assert_eq!(after_open, 1);
        assert_eq!(publisher.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_intent_cancels_pending_second_pulse() {
        let (publisher, gate) = make_gate();

        gate.on_position_update(50);
        gate.on_position_update(30);
        gate.get_current_state();

        gate.set_target_state(TargetDoorState::Closed);
        advance_ms(500).await;
        gate.set_target_state(TargetDoorState::Open);

        advance_ms(2000).await;
        assert_eq!(publisher.count(), 1);
        assert!(!gate.snapshot().pulse_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_state_read_syncs_target_while_closing() {
        let (_, gate) = make_gate();

        gate.set_target_state(TargetDoorState::Open);
        assert_eq!(gate.get_target_state(), TargetDoorState::Open);

        gate.on_position_update(10);
        gate.on_position_update(20);
        assert_eq!(gate.get_target_state(), TargetDoorState::Open);

        assert_eq!(gate.get_current_state(), CurrentDoorState::Closing);
        assert_eq!(gate.get_target_state(), TargetDoorState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_without_trigger_url_sends_nothing() {
        let publisher = Arc::new(RecordingPublisher::new());
        let gate = GateStateMachine::new(
            "Side Gate",
            None,
            publisher.clone(),
            GateTimings::default(),
        );

        gate.set_target_state(TargetDoorState::Open);
        advance_ms(2000).await;

        assert_eq!(publisher.count(), 0);
        assert_eq!(gate.get_target_state(), TargetDoorState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_timings() {
        let publisher = Arc::new(RecordingPublisher::new());
        let timings = GateTimings {
            settle: Duration::from_millis(100),
            obstruction_window: Duration::from_millis(150),
            pulse_interval: Duration::from_millis(50),
        };
        let gate = GateStateMachine::new("Gate", None, publisher, timings);

        gate.on_position_update(50);
        gate.on_position_update(30);
        advance_ms(110).await;

        assert_eq!(gate.snapshot().current, CurrentDoorState::Open);
        assert_eq!(gate.timings(), timings);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_gate_cancels_timers() {
        let (_, gate) = make_gate();
        gate.on_position_update(50);

        let weak = Arc::downgrade(&gate.inner);
        drop(gate);
        advance_ms(2001).await;

        assert!(weak.upgrade().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_event_keeps_receive_time() {
        let (_, gate) = make_gate();
        assert_eq!(gate.snapshot().last_sample_at, None);

        let received_at = Utc::now() - chrono::Duration::seconds(5);
        let event = PositionEvent {
            key: "gate/front".to_string(),
            position: 40,
            received_at,
        };
        gate.on_position_event(&event);

        let snapshot = gate.snapshot();
        assert_eq!(snapshot.last_position, 40);
        assert_eq!(snapshot.last_sample_at, Some(received_at));
        assert_eq!(snapshot.current, CurrentDoorState::Opening);

        gate.on_position_update(20);
        assert!(gate.snapshot().last_sample_at > Some(received_at));
    }
}
