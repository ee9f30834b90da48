//! # Device Registry
//!
//! Sole owner of [`TrackedDevice`]s. Every mutation goes through the methods
//! here; observers only ever get [`DeviceSnapshot`] copies.
//!
//! Invariant: at most one tracked device, and so one polling session, per
//! device name. `detach` waits for the session task to exit before the
//! record is flushed and the entry dropped, so a later `attach` of the same
//! name loads the flushed record and never runs alongside the old task.

use super::session::PollingSession;
use super::TrackerSettings;
use crate::device::{DeviceIdentity, DeviceInfo, ExclusionSet, ProfileCatalog};
use crate::error::Result;
use crate::platform::Platform;
use crate::usage::{UsageRecord, UsageStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// An attached device being tracked
pub struct TrackedDevice {
    info: DeviceInfo,
    session: PollingSession,
    last_flushed: Option<DateTime<Utc>>,
}

impl TrackedDevice {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn is_tracking(&self) -> bool {
        self.session.is_running()
    }

    pub fn usage(&self) -> UsageRecord {
        self.session.snapshot()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            info: self.info.clone(),
            usage: self.session.snapshot(),
            is_tracking: self.session.is_running(),
            last_flushed: self.last_flushed,
        }
    }
}

/// Read-only view of a tracked device for the UI
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    #[serde(flatten)]
    pub info: DeviceInfo,
    pub usage: UsageRecord,
    pub is_tracking: bool,
    pub last_flushed: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// Indexed set of tracked devices
pub struct DeviceRegistry {
    platform: Arc<dyn Platform>,
    store: UsageStore,
    catalog: ProfileCatalog,
    exclusions: ExclusionSet,
    settings: TrackerSettings,
    devices: Vec<TrackedDevice>,
}

impl DeviceRegistry {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: UsageStore,
        catalog: ProfileCatalog,
        exclusions: ExclusionSet,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            platform,
            store,
            catalog,
            exclusions,
            settings,
            devices: Vec::new(),
        }
    }

    pub fn store(&self) -> &UsageStore {
        &self.store
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.name() == name)
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&TrackedDevice> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Query the platform for attached devices.
    ///
    /// Entries sharing a name collapse to the first one seen; platform order
    /// is kept. Excluded devices are dropped.
    pub fn discover(&self) -> Result<Vec<DeviceIdentity>> {
        let attached = self.platform.list_attached_devices()?;
        Ok(dedup_and_filter(attached, &self.exclusions))
    }

    /// True if the platform still lists an entry with this name.
    ///
    /// Composite devices show up several times under one name, and a detach
    /// notification may be for just one of them. A failed enumeration
    /// counts as not attached.
    pub fn still_attached(&self, name: &str) -> bool {
        match self.platform.list_attached_devices() {
            Ok(attached) => attached.iter().any(|d| d.name == name),
            Err(err) => {
                warn!("Could not confirm detach of '{}': {}", name, err);
                false
            }
        }
    }

    /// Start tracking a device. Returns `None` if it is excluded.
    ///
    /// Attaching an already tracked name changes nothing and returns the
    /// existing device's snapshot.
    pub async fn attach(&mut self, identity: DeviceIdentity) -> Option<DeviceSnapshot> {
        if let Some(existing) = self.get(&identity.name) {
            debug!("'{}' is already tracked", identity.name);
            return Some(existing.snapshot());
        }

        if self.exclusions.excludes(&identity) {
            debug!("'{}' is excluded from tracking", identity.name);
            return None;
        }

        let info = DeviceInfo::merge(&identity, self.catalog.get(&identity.name));
        let record = match self.store.load(&identity.name) {
            Ok(Some(record)) => record,
            Ok(None) => UsageRecord::new(),
            Err(err) => {
                warn!(
                    "Could not load usage data for '{}', starting empty: {}",
                    identity.name, err
                );
                UsageRecord::new()
            }
        };

        let mut session = PollingSession::new(
            identity.name.clone(),
            info.effective_type,
            record,
            Arc::clone(&self.platform),
            &self.settings,
        );
        session.start().await;

        info!(
            "Tracking '{}' ({}, {})",
            info.name, info.device_type, info.port_type
        );
        let device = TrackedDevice {
            info,
            session,
            last_flushed: None,
        };
        let snapshot = device.snapshot();
        self.devices.push(device);
        Some(snapshot)
    }

    /// Stop tracking a device and flush its record. No-op for unknown names.
    pub async fn detach(&mut self, name: &str) {
        let Some(index) = self.position(name) else {
            debug!("Detach of untracked device '{}' ignored", name);
            return;
        };

        let mut device = self.devices.remove(index);
        device.session.shutdown().await;
        flush_device(&self.store, &mut device);
        info!("Stopped tracking '{}'", name);
    }

    /// Bring the tracked set in line with a discovery result: attach what is
    /// new, detach what is gone.
    pub async fn reconcile(&mut self, discovered: Vec<DeviceIdentity>) {
        let gone: Vec<String> = {
            let present: HashSet<&str> = discovered.iter().map(|d| d.name.as_str()).collect();
            self.devices
                .iter()
                .filter(|d| !present.contains(d.name()))
                .map(|d| d.name().to_string())
                .collect()
        };

        for name in gone {
            self.detach(&name).await;
        }

        for identity in discovered {
            self.attach(identity).await;
        }
    }

    /// Snapshot of every tracked device, in attach order
    pub fn list(&self) -> Vec<DeviceSnapshot> {
        self.devices.iter().map(TrackedDevice::snapshot).collect()
    }

    pub fn any_running(&self) -> bool {
        self.devices.iter().any(TrackedDevice::is_tracking)
    }

    /// Stop every session if any is running, otherwise start them all.
    /// Stopped sessions are flushed. Returns whether tracking is now on.
    pub async fn toggle_all(&mut self) -> bool {
        if self.any_running() {
            for device in &self.devices {
                device.session.stop();
            }
            for device in &mut self.devices {
                device.session.join().await;
            }
            self.flush_all();
            false
        } else {
            for device in &mut self.devices {
                device.session.start().await;
            }
            !self.devices.is_empty()
        }
    }

    /// Save every record. Returns the number of devices saved successfully.
    pub fn flush_all(&mut self) -> usize {
        let mut saved = 0;
        for device in &mut self.devices {
            if flush_device(&self.store, device) {
                saved += 1;
            }
        }
        saved
    }

    /// Stop, flush and drop every tracked device
    pub async fn shutdown(&mut self) {
        for device in &self.devices {
            device.session.stop();
        }
        let names: Vec<String> = self.devices.iter().map(|d| d.name().to_string()).collect();
        for name in names {
            self.detach(&name).await;
        }
    }
}

fn flush_device(store: &UsageStore, device: &mut TrackedDevice) -> bool {
    let record = device.session.snapshot();
    match store.save(device.name(), &record) {
        Ok(()) => {
            device.last_flushed = Some(Utc::now());
            true
        }
        Err(err) => {
            error!("Failed to save usage for '{}': {}", device.name(), err);
            false
        }
    }
}

/// First-seen-wins dedup by name, then exclusion filtering
pub fn dedup_and_filter(
    attached: Vec<DeviceIdentity>,
    exclusions: &ExclusionSet,
) -> Vec<DeviceIdentity> {
    let mut seen = HashSet::new();
    attached
        .into_iter()
        .filter(|identity| seen.insert(identity.name.clone()))
        .filter(|identity| {
            let excluded = exclusions.excludes(identity);
            if excluded {
                debug!("Excluding '{}'", identity.name);
            }
            !excluded
        })
        .collect()
}
