//! Restart with a warm accessory cache

use gw_core::{Characteristic, CharacteristicValue, DeviceConfig, DeviceType, TriggerRequest};
use gw_gate::GateTimings;
use gw_platform::{DiscoverySummary, LocalHost, Platform};
use gw_position_feed::PositionFeed;
use gw_trigger::RecordingPublisher;
use std::sync::Arc;

fn gate(name: &str, key: &str) -> DeviceConfig {
    DeviceConfig::new(name, DeviceType::Gate)
        .with_key(key)
        .with_trigger(TriggerRequest::get(format!("http://relay.local/{key}")))
}

fn platform(devices: Vec<DeviceConfig>, host: Arc<LocalHost>) -> (Platform, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::new());
    let platform = Platform::new(
        "Remote Gateway",
        devices,
        GateTimings::default(),
        publisher.clone(),
        Arc::new(PositionFeed::new()),
        host,
    );
    (platform, publisher)
}

#[tokio::test(start_paused = true)]
async fn test_restart_reconciles_cache_with_config() {
    let host = Arc::new(LocalHost::new());

    // First start: everything is new
    let (first, _) = platform(
        vec![gate("Front", "front"), gate("Back", "back")],
        host.clone(),
    );
    assert_eq!(
        first.discover_devices().unwrap(),
        DiscoverySummary {
            added: 2,
            ..Default::default()
        }
    );
    drop(first);

    // Second start: "back" was removed from the config, "side" was added
    let (second, publisher) = platform(
        vec![gate("Front", "front"), gate("Side", "side")],
        host.clone(),
    );
    for accessory in host.registered() {
        second.configure_accessory(accessory);
    }

    let summary = second.discover_devices().unwrap();
    assert_eq!(
        summary,
        DiscoverySummary {
            added: 1,
            restored: 1,
            removed: 1,
            skipped: 0,
        }
    );

    let names: Vec<_> = host
        .registered()
        .into_iter()
        .map(|a| a.display_name)
        .collect();
    assert_eq!(names, vec!["Front", "Side"]);

    // Restored accessories get working handlers
    let front = gate("Front", "front").accessory_id();
    second
        .set_characteristic(&front, Characteristic::TargetDoorState, CharacteristicValue::Int(0))
        .unwrap();
    assert_eq!(publisher.count(), 1);
    assert_eq!(
        publisher.published()[0].request.url,
        "http://relay.local/front"
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_cached_device_is_kept_but_not_bridged() {
    let host = Arc::new(LocalHost::new());
    let blinds = DeviceConfig::new("Blinds", DeviceType::Unknown("blind".to_string()));

    let (platform, _) = platform(vec![blinds.clone()], host.clone());
    platform.configure_accessory(gw_platform::PlatformAccessory::for_device(&blinds));

    let summary = platform.discover_devices().unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.removed, 0);
    assert!(platform.accessory(&blinds.accessory_id()).is_none());
    assert_eq!(platform.cached_accessories().len(), 1);
}
