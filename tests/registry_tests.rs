//! Device registry tests
//!
//! Attach/detach lifecycle, usage persistence across sessions, exclusions
//! and global toggling, driven through an in-memory platform.

use lifecycle::device::{
    Component, DeviceIdentity, DeviceProfile, DeviceType, ExclusionSet, InputEvent, PortType,
    ProfileCatalog,
};
use lifecycle::platform::MemoryPlatform;
use lifecycle::tracking::{DeviceRegistry, TrackerSettings};
use lifecycle::usage::{UsageRecord, UsageStore};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const MS: u64 = 1_000_000;

fn settings() -> TrackerSettings {
    TrackerSettings {
        poll_interval: Duration::from_millis(1),
        flush_interval: None,
        ..TrackerSettings::default()
    }
}

/// Helper to create a registry over a fresh platform and temp store
fn create_registry(
    temp_dir: &TempDir,
    catalog: ProfileCatalog,
    exclusions: ExclusionSet,
) -> (Arc<MemoryPlatform>, DeviceRegistry) {
    let platform = Arc::new(MemoryPlatform::new());
    let store = UsageStore::open(temp_dir.path().join("usage")).unwrap();
    let registry = DeviceRegistry::new(platform.clone(), store, catalog, exclusions, settings());
    (platform, registry)
}

fn pad(name: &str) -> DeviceIdentity {
    DeviceIdentity::new(name, DeviceType::Gamepad, PortType::Usb)
}

/// Press/release pairs on one button, each pair in its own milliseconds
fn clicks(component: &str, count: u64, start_ms: u64) -> Vec<InputEvent> {
    (0..count)
        .flat_map(|i| {
            let ms = start_ms + i * 10;
            [
                InputEvent::new(Component::button(component), 1.0, ms * MS),
                InputEvent::new(Component::button(component), 0.0, (ms + 1) * MS),
            ]
        })
        .collect()
}

async fn wait_for_count(registry: &DeviceRegistry, device: &str, component: &str, count: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let current = registry
            .get(device)
            .map(|d| d.usage().get(component))
            .unwrap_or(0);
        if current >= count {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {device}/{component} to reach {count}, at {current}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn test_three_releases_are_flushed_on_detach() {
    let temp_dir = TempDir::new().unwrap();
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), ExclusionSet::default());

    platform.attach(pad("PadX"));
    let snapshot = registry.attach(pad("PadX")).await.unwrap();
    assert!(snapshot.usage.is_empty());
    assert!(snapshot.is_tracking);

    platform.push_events("PadX", clicks("A", 3, 100));
    wait_for_count(&registry, "PadX", "A", 3).await;

    registry.detach("PadX").await;
    assert!(!registry.is_tracked("PadX"));

    let saved = registry.store().load("PadX").unwrap().unwrap();
    assert_eq!(saved.get("A"), 3);
}

#[tokio::test]
async fn test_attach_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), ExclusionSet::default());
    platform.insert(pad("PadX"));

    registry.attach(pad("PadX")).await.unwrap();
    platform.push_events("PadX", clicks("A", 1, 100));
    wait_for_count(&registry, "PadX", "A", 1).await;

    let again = registry.attach(pad("PadX")).await.unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(again.usage.get("A"), 1);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_detach_of_unknown_device_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let (_platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), ExclusionSet::default());

    registry.detach("Ghost").await;
    assert!(registry.is_empty());
    assert!(registry.store().stored_devices().unwrap().is_empty());
}

#[tokio::test]
async fn test_reattach_continues_from_flushed_record() {
    let temp_dir = TempDir::new().unwrap();
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), ExclusionSet::default());
    platform.insert(pad("PadX"));

    registry.attach(pad("PadX")).await;
    platform.push_events("PadX", clicks("A", 2, 100));
    wait_for_count(&registry, "PadX", "A", 2).await;
    registry.detach("PadX").await;

    platform.insert(pad("PadX"));
    let snapshot = registry.attach(pad("PadX")).await.unwrap();
    assert_eq!(snapshot.usage.get("A"), 2);

    platform.push_events("PadX", clicks("A", 1, 500));
    wait_for_count(&registry, "PadX", "A", 3).await;
    registry.detach("PadX").await;

    assert_eq!(registry.store().load("PadX").unwrap().unwrap().get("A"), 3);
}

#[tokio::test]
async fn test_excluded_device_is_not_tracked() {
    let temp_dir = TempDir::new().unwrap();
    let exclusions = ExclusionSet::from_names(["AURA LED", "Composite Device"]);
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), exclusions);

    platform.insert(DeviceIdentity::new("AURA LED", DeviceType::Unknown, PortType::Usb));
    platform.insert(DeviceIdentity::new(
        "Composite Device",
        DeviceType::Keyboard,
        PortType::Usb,
    ));

    assert!(registry
        .attach(DeviceIdentity::new("AURA LED", DeviceType::Unknown, PortType::Usb))
        .await
        .is_none());
    assert!(registry
        .attach(DeviceIdentity::new(
            "Composite Device",
            DeviceType::Keyboard,
            PortType::Usb
        ))
        .await
        .is_none());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_profile_metadata_is_merged() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = ProfileCatalog::from_profiles([DeviceProfile {
        name: "DD Pro".to_string(),
        description: Some("Direct drive wheel base".to_string()),
        manufacturer: Some("Fanatec".to_string()),
        device_type: Some("Wheel".to_string()),
        port_type: Some("USB port".to_string()),
    }]);
    let (platform, mut registry) = create_registry(&temp_dir, catalog, ExclusionSet::default());

    let identity = DeviceIdentity::new("DD Pro", DeviceType::Unknown, PortType::Unknown);
    platform.insert(identity.clone());
    let snapshot = registry.attach(identity).await.unwrap();

    assert_eq!(snapshot.info.manufacturer, "Fanatec");
    assert_eq!(snapshot.info.device_type, "Wheel");
    assert_eq!(snapshot.info.port_type, "USB port");

    // Profile-declared wheel: full-lock steering is not a use
    platform.push_events(
        "DD Pro",
        vec![
            InputEvent::new(Component::axis("x"), 1.0, MS),
            InputEvent::new(Component::button("Paddle"), 1.0, 2 * MS),
            InputEvent::new(Component::button("Paddle"), 0.0, 3 * MS),
        ],
    );
    wait_for_count(&registry, "DD Pro", "Paddle", 1).await;
    assert!(!registry.get("DD Pro").unwrap().usage().contains("x"));

    registry.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_usage_file_starts_empty() {
    let temp_dir = TempDir::new().unwrap();
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), ExclusionSet::default());
    fs::write(registry.store().path_for("PadX"), "{ broken").unwrap();
    platform.insert(pad("PadX"));

    let snapshot = registry.attach(pad("PadX")).await.unwrap();
    assert!(snapshot.usage.is_empty());
    assert!(snapshot.is_tracking);

    registry.shutdown().await;
    // The flush on shutdown replaced the corrupt file
    assert_eq!(
        registry.store().load("PadX").unwrap(),
        Some(UsageRecord::new())
    );
}

#[tokio::test]
async fn test_toggle_all_stops_flushes_and_restarts() {
    let temp_dir = TempDir::new().unwrap();
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), ExclusionSet::default());
    platform.insert(pad("PadX"));
    platform.insert(pad("PadY"));
    registry.attach(pad("PadX")).await;
    registry.attach(pad("PadY")).await;

    platform.push_events("PadX", clicks("A", 2, 100));
    wait_for_count(&registry, "PadX", "A", 2).await;

    assert!(!registry.toggle_all().await);
    assert!(registry.list().iter().all(|d| !d.is_tracking));
    assert_eq!(registry.store().load("PadX").unwrap().unwrap().get("A"), 2);
    assert!(registry.store().load("PadY").unwrap().is_some());

    // Events queued while paused are counted once tracking resumes
    platform.push_events("PadX", clicks("A", 1, 500));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(registry.get("PadX").unwrap().usage().get("A"), 2);

    assert!(registry.toggle_all().await);
    assert!(registry.list().iter().all(|d| d.is_tracking));
    wait_for_count(&registry, "PadX", "A", 3).await;

    registry.shutdown().await;
}

#[tokio::test]
async fn test_toggle_all_with_partial_running_stops_everything() {
    let temp_dir = TempDir::new().unwrap();
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), ExclusionSet::default());
    platform.insert(pad("PadX"));
    platform.insert(pad("PadY"));
    registry.attach(pad("PadX")).await;

    registry.toggle_all().await;
    registry.attach(pad("PadY")).await;

    // PadY runs, PadX does not: any running means stop all
    assert!(!registry.toggle_all().await);
    assert!(!registry.any_running());

    registry.shutdown().await;
}

#[tokio::test]
async fn test_reconcile_matches_attached_set() {
    let temp_dir = TempDir::new().unwrap();
    let exclusions = ExclusionSet::from_names(["AURA LED"]);
    let (platform, mut registry) =
        create_registry(&temp_dir, ProfileCatalog::default(), exclusions);

    platform.insert(pad("PadX"));
    platform.insert(pad("PadX"));
    platform.insert(pad("AURA LED"));
    platform.insert(pad("Pedals"));

    let discovered = registry.discover().unwrap();
    registry.reconcile(discovered).await;
    let names: Vec<String> = registry.list().iter().map(|d| d.name().to_string()).collect();
    assert_eq!(names, vec!["PadX", "Pedals"]);

    platform.detach("PadX");
    platform.insert(pad("Stick"));
    let discovered = registry.discover().unwrap();
    registry.reconcile(discovered.clone()).await;
    registry.reconcile(discovered).await;

    let names: Vec<String> = registry.list().iter().map(|d| d.name().to_string()).collect();
    assert_eq!(names, vec!["Pedals", "Stick"]);
    assert!(registry.store().load("PadX").unwrap().is_some());

    registry.shutdown().await;
}
