//! Device discovery and the accessory cache

use crate::accessory::PlatformAccessory;
use crate::error::{PlatformError, PlatformResult};
use crate::gate::GateAccessory;
use crate::handler::{AccessoryHandler, SharedHandler};
use crate::host::SharedHost;
use crate::switch::SwitchAccessory;
use dashmap::DashMap;
use gw_config::{BridgeConfig, TimingsConfig};
use gw_core::{
    AccessoryId, Characteristic, CharacteristicResult, CharacteristicValue, DeviceConfig,
    DeviceType, PositionEvent,
};
use gw_gate::{GateStateMachine, GateTimings};
use gw_position_feed::SharedPositionFeed;
use gw_trigger::SharedPublisher;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Outcome of one discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverySummary {
    pub added: usize,
    pub restored: usize,
    pub removed: usize,
    pub skipped: usize,
}

/// A configured accessory with its live handler
pub struct BridgedAccessory {
    order: usize,
    accessory: PlatformAccessory,
    handler: SharedHandler,
}

impl BridgedAccessory {
    pub fn id(&self) -> AccessoryId {
        self.accessory.id
    }

    pub fn accessory(&self) -> &PlatformAccessory {
        &self.accessory
    }

    pub fn handler(&self) -> &dyn AccessoryHandler {
        self.handler.as_ref()
    }

    pub fn get(&self, characteristic: Characteristic) -> CharacteristicResult<CharacteristicValue> {
        self.handler.get(characteristic)
    }

    pub fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> CharacteristicResult<()> {
        self.handler.set(characteristic, value)
    }
}

/// Gate timings with any configured overrides applied
pub fn gate_timings(config: Option<&TimingsConfig>) -> GateTimings {
    let mut timings = GateTimings::default();
    if let Some(config) = config {
        if let Some(ms) = config.settle_ms {
            timings.settle = Duration::from_millis(ms);
        }
        if let Some(ms) = config.obstruction_window_ms {
            timings.obstruction_window = Duration::from_millis(ms);
        }
        if let Some(ms) = config.pulse_interval_ms {
            timings.pulse_interval = Duration::from_millis(ms);
        }
    }
    timings
}

/// The bridge platform
///
/// Holds the accessories the host restored from its cache and, after
/// [`Platform::discover_devices`], one handler per configured device. Gates
/// with a feed key get a task that forwards their position samples.
pub struct Platform {
    name: String,
    devices: Vec<DeviceConfig>,
    timings: GateTimings,
    publisher: SharedPublisher,
    feed: SharedPositionFeed,
    host: SharedHost,
    cached: DashMap<AccessoryId, PlatformAccessory>,
    bridged: DashMap<AccessoryId, Arc<BridgedAccessory>>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
}

impl Platform {
    pub fn new(
        name: impl Into<String>,
        devices: Vec<DeviceConfig>,
        timings: GateTimings,
        publisher: SharedPublisher,
        feed: SharedPositionFeed,
        host: SharedHost,
    ) -> Self {
        let name = name.into();
        debug!(platform = %name, "Finished initializing platform");
        Self {
            name,
            devices,
            timings,
            publisher,
            feed,
            host,
            cached: DashMap::new(),
            bridged: DashMap::new(),
            forwarders: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(
        config: &BridgeConfig,
        publisher: SharedPublisher,
        feed: SharedPositionFeed,
        host: SharedHost,
    ) -> Self {
        Self::new(
            config.name.clone(),
            config.devices.clone(),
            gate_timings(config.timings.as_ref()),
            publisher,
            feed,
            host,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record an accessory the host restored from its cache
    pub fn configure_accessory(&self, accessory: PlatformAccessory) {
        info!(accessory = %accessory.display_name, "Loading accessory from cache");
        self.cached.insert(accessory.id, accessory);
    }

    /// Reconcile the cache with the configured devices and build handlers
    ///
    /// Cached accessories that are no longer configured are unregistered,
    /// cached ones that are still configured are restored, and the rest are
    /// registered as new. Devices of unknown type are skipped. Running this
    /// again rebuilds every handler from scratch.
    #[instrument(skip(self), fields(platform = %self.name))]
    pub fn discover_devices(&self) -> PlatformResult<DiscoverySummary> {
        let runtime = Handle::try_current().map_err(|_| PlatformError::NoRuntime)?;
        let mut summary = DiscoverySummary::default();

        self.stop_forwarders();
        self.bridged.clear();

        let configured: HashSet<AccessoryId> =
            self.devices.iter().map(DeviceConfig::accessory_id).collect();

        let stale: Vec<PlatformAccessory> = self
            .cached
            .iter()
            .filter(|entry| !configured.contains(entry.key()))
            .map(|entry| entry.value().clone())
            .collect();
        if !stale.is_empty() {
            for accessory in &stale {
                info!(accessory = %accessory.display_name, "Removing accessory no longer configured");
                self.cached.remove(&accessory.id);
            }
            self.host.unregister_accessories(&stale);
            summary.removed = stale.len();
        }

        let mut added = Vec::new();
        let mut forwarders = Vec::new();

        for (order, device) in self.devices.iter().enumerate() {
            let id = device.accessory_id();
            if self.bridged.contains_key(&id) {
                warn!(device = %device.display_name, %id, "Duplicate accessory id, skipping device");
                summary.skipped += 1;
                continue;
            }

            let Some((handler, forwarder)) = self.build_handler(device, &runtime) else {
                summary.skipped += 1;
                continue;
            };
            forwarders.extend(forwarder);

            let restored = self.cached.get_mut(&id).map(|mut cached| {
                cached.device = Some(device.clone());
                cached.clone()
            });
            let accessory = match restored {
                Some(accessory) => {
                    info!(accessory = %accessory.display_name, "Restoring existing accessory from cache");
                    summary.restored += 1;
                    accessory
                }
                None => {
                    info!(accessory = %device.display_name, "Adding new accessory");
                    let accessory = PlatformAccessory::for_device(device);
                    self.cached.insert(id, accessory.clone());
                    added.push(accessory.clone());
                    accessory
                }
            };

            self.bridged.insert(
                id,
                Arc::new(BridgedAccessory {
                    order,
                    accessory,
                    handler,
                }),
            );
        }

        if !added.is_empty() {
            self.host.register_accessories(&added);
            summary.added = added.len();
        }

        *self.forwarders.lock().unwrap_or_else(PoisonError::into_inner) = forwarders;

        info!(
            added = summary.added,
            restored = summary.restored,
            removed = summary.removed,
            skipped = summary.skipped,
            "Discovery finished"
        );
        Ok(summary)
    }

    fn build_handler(
        &self,
        device: &DeviceConfig,
        runtime: &Handle,
    ) -> Option<(SharedHandler, Option<JoinHandle<()>>)> {
        match &device.device_type {
            DeviceType::Gate => {
                let gate = GateStateMachine::new(
                    &device.display_name,
                    device.trigger(),
                    self.publisher.clone(),
                    self.timings,
                );
                let forwarder = device.key.as_deref().map(|key| {
                    spawn_forwarder(runtime, gate.clone(), self.feed.subscribe(key))
                });
                let handler: SharedHandler = Arc::new(GateAccessory::new(gate));
                Some((handler, forwarder))
            }
            DeviceType::Switch => {
                let handler: SharedHandler = Arc::new(SwitchAccessory::new(
                    &device.display_name,
                    device.trigger(),
                    self.publisher.clone(),
                ));
                Some((handler, None))
            }
            DeviceType::Unknown(kind) => {
                warn!(device = %device.display_name, kind = %kind, "Unknown device type, skipping");
                None
            }
        }
    }

    /// Look up a bridged accessory
    pub fn accessory(&self, id: &AccessoryId) -> Option<Arc<BridgedAccessory>> {
        self.bridged.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Bridged accessories in configuration order
    pub fn accessories(&self) -> Vec<Arc<BridgedAccessory>> {
        let mut accessories: Vec<_> = self
            .bridged
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accessories.sort_by_key(|bridged| bridged.order);
        accessories
    }

    /// Accessories currently held in the cache
    pub fn cached_accessories(&self) -> Vec<PlatformAccessory> {
        self.cached.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn get_characteristic(
        &self,
        id: &AccessoryId,
        characteristic: Characteristic,
    ) -> PlatformResult<CharacteristicValue> {
        let bridged = self
            .accessory(id)
            .ok_or(PlatformError::AccessoryNotFound(*id))?;
        Ok(bridged.get(characteristic)?)
    }

    pub fn set_characteristic(
        &self,
        id: &AccessoryId,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> PlatformResult<()> {
        let bridged = self
            .accessory(id)
            .ok_or(PlatformError::AccessoryNotFound(*id))?;
        Ok(bridged.set(characteristic, value)?)
    }

    /// Stop forwarding position samples
    pub fn stop_forwarders(&self) {
        let mut forwarders = self.forwarders.lock().unwrap_or_else(PoisonError::into_inner);
        for forwarder in forwarders.drain(..) {
            forwarder.abort();
        }
    }
}

impl Drop for Platform {
    fn drop(&mut self) {
        self.stop_forwarders();
    }
}

/// Deliver every sample on a gate's channel to its state machine
fn spawn_forwarder(
    runtime: &Handle,
    gate: GateStateMachine,
    mut samples: broadcast::Receiver<PositionEvent>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        loop {
            match samples.recv().await {
                Ok(event) => gate.on_position_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(gate = %gate.name(), skipped, "Position listener lagged, samples dropped");
                }
                Err(RecvError::Closed) => {
                    debug!(gate = %gate.name(), "Position channel closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalHost;
    use gw_core::{CurrentDoorState, TriggerRequest};
    use gw_position_feed::PositionFeed;
    use gw_trigger::RecordingPublisher;

    struct Fixture {
        platform: Platform,
        feed: SharedPositionFeed,
        host: Arc<LocalHost>,
        publisher: Arc<RecordingPublisher>,
    }

    fn fixture(devices: Vec<DeviceConfig>) -> Fixture {
        let feed = Arc::new(PositionFeed::new());
        let host = Arc::new(LocalHost::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let platform = Platform::new(
            "Remote Gateway",
            devices,
            GateTimings::default(),
            publisher.clone(),
            feed.clone(),
            host.clone(),
        );
        Fixture {
            platform,
            feed,
            host,
            publisher,
        }
    }

    fn front_gate() -> DeviceConfig {
        DeviceConfig::new("Front Gate", DeviceType::Gate)
            .with_key("gate/front")
            .with_trigger(TriggerRequest::get("http://relay.local/gate"))
    }

    fn porch_light() -> DeviceConfig {
        DeviceConfig::new("Porch Light", DeviceType::Switch)
            .with_trigger(TriggerRequest::get("http://relay.local/light"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_registers_new_accessories() {
        let f = fixture(vec![front_gate(), porch_light()]);

        let summary = f.platform.discover_devices().unwrap();
        assert_eq!(
            summary,
            DiscoverySummary {
                added: 2,
                ..Default::default()
            }
        );
        assert_eq!(f.host.len(), 2);

        let names: Vec<_> = f
            .platform
            .accessories()
            .iter()
            .map(|b| b.accessory().display_name.clone())
            .collect();
        assert_eq!(names, vec!["Front Gate", "Porch Light"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_type_skipped_others_set_up() {
        let f = fixture(vec![
            DeviceConfig::new("Blinds", DeviceType::Unknown("blind".to_string())),
            porch_light(),
        ]);

        let summary = f.platform.discover_devices().unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
        assert!(f
            .platform
            .accessory(&porch_light().accessory_id())
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_id_skipped() {
        let f = fixture(vec![front_gate(), front_gate()]);

        let summary = f.platform.discover_devices().unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positions_forwarded_to_gate() {
        let f = fixture(vec![front_gate()]);
        f.platform.discover_devices().unwrap();
        let id = front_gate().accessory_id();

        f.feed.publish_raw("gate/front", "100").unwrap();
        f.feed.publish_raw("gate/front", "60").unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = f
            .platform
            .accessory(&id)
            .and_then(|b| b.handler().gate_snapshot())
            .unwrap();
        assert_eq!(snapshot.current, CurrentDoorState::Opening);
        assert_eq!(snapshot.last_position, 60);
        assert!(snapshot.last_sample_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_characteristic_access_by_id() {
        let f = fixture(vec![porch_light()]);
        f.platform.discover_devices().unwrap();
        let id = porch_light().accessory_id();

        f.platform
            .set_characteristic(&id, Characteristic::On, true.into())
            .unwrap();
        assert_eq!(f.publisher.count(), 1);
        assert_eq!(
            f.platform.get_characteristic(&id, Characteristic::On),
            Ok(CharacteristicValue::Bool(true))
        );

        let missing = AccessoryId::from_key("missing");
        assert_eq!(
            f.platform.get_characteristic(&missing, Characteristic::On),
            Err(PlatformError::AccessoryNotFound(missing))
        );
        assert!(matches!(
            f.platform.get_characteristic(&id, Characteristic::TargetDoorState),
            Err(PlatformError::Characteristic(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rediscovery_restores_instead_of_adding() {
        let f = fixture(vec![front_gate()]);
        f.platform.discover_devices().unwrap();

        let summary = f.platform.discover_devices().unwrap();
        assert_eq!(
            summary,
            DiscoverySummary {
                restored: 1,
                ..Default::default()
            }
        );
        assert_eq!(f.host.len(), 1);
    }

    #[test]
    fn test_discover_outside_runtime() {
        let f = fixture(vec![porch_light()]);
        assert_eq!(f.platform.discover_devices(), Err(PlatformError::NoRuntime));
    }

    #[test]
    fn test_gate_timings_overrides() {
        let timings = gate_timings(Some(&TimingsConfig {
            settle_ms: Some(500),
            obstruction_window_ms: None,
            pulse_interval_ms: Some(750),
        }));
        assert_eq!(timings.settle, Duration::from_millis(500));
        assert_eq!(timings.obstruction_window, GateTimings::default().obstruction_window);
        assert_eq!(timings.pulse_interval, Duration::from_millis(750));
        assert_eq!(gate_timings(None), GateTimings::default());
    }
}
