//! # Tracking Controller
//!
//! Top-level facade. Owns the [`DeviceRegistry`] behind an async mutex and
//! runs one background loop that applies hotplug notifications one at a
//! time, flushes records and re-enumerates devices on their intervals.
//!
//! UI callers use [`TrackingController::list`] and
//! [`TrackingController::toggle_all`]; both take the same lock as the
//! hotplug loop, so they never observe a half-applied attach or detach.

use super::registry::{DeviceRegistry, DeviceSnapshot};
use super::TrackerSettings;
use crate::device::{ExclusionSet, ProfileCatalog};
use crate::platform::{HotplugEvent, Platform};
use crate::usage::UsageStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct TrackingController {
    registry: Arc<Mutex<DeviceRegistry>>,
    platform: Arc<dyn Platform>,
    settings: TrackerSettings,
    background: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl TrackingController {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: UsageStore,
        catalog: ProfileCatalog,
        exclusions: ExclusionSet,
        settings: TrackerSettings,
    ) -> Self {
        let registry = DeviceRegistry::new(
            Arc::clone(&platform),
            store,
            catalog,
            exclusions,
            settings.clone(),
        );
        Self {
            registry: Arc::new(Mutex::new(registry)),
            platform,
            settings,
            background: None,
        }
    }

    /// Track every device attached right now and start listening for
    /// hotplug notifications. Calling it twice does nothing.
    pub async fn start(&mut self) {
        if self.background.is_some() {
            return;
        }

        // Subscribe before the first scan so an attach in between is not lost
        let events = self.platform.subscribe();
        self.rescan().await;

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = Worker {
            registry: Arc::clone(&self.registry),
            events,
            stop: stop_rx,
            flush: self.settings.flush_interval.and_then(interval),
            rescan: self.settings.rescan_interval.and_then(interval),
        };
        self.background = Some((stop_tx, tokio::spawn(worker.run())));
        info!("Tracking controller started");
    }

    /// Apply one hotplug notification
    pub async fn handle(&self, event: HotplugEvent) {
        apply(&self.registry, event).await;
    }

    /// Re-enumerate devices and reconcile the tracked set
    pub async fn rescan(&self) {
        rescan(&self.registry).await;
    }

    /// Snapshot of every tracked device
    pub async fn list(&self) -> Vec<DeviceSnapshot> {
        self.registry.lock().await.list()
    }

    /// Stop all sessions if any runs, else start all. Returns the new state.
    pub async fn toggle_all(&self) -> bool {
        let tracking = self.registry.lock().await.toggle_all().await;
        info!("Tracking {}", if tracking { "resumed" } else { "paused" });
        tracking
    }

    /// Save every tracked record now
    pub async fn flush(&self) -> usize {
        self.registry.lock().await.flush_all()
    }

    /// Stop the background loop, then stop and flush every session
    pub async fn shutdown(mut self) {
        if let Some((stop_tx, handle)) = self.background.take() {
            let _ = stop_tx.send(true);
            if let Err(err) = handle.await {
                warn!("Controller loop ended abnormally: {}", err);
            }
        }
        self.registry.lock().await.shutdown().await;
        info!("Tracking controller stopped");
    }
}

/// First tick one `period` from now. `None` if that instant is not
/// representable, which disables the timer.
fn interval(period: Duration) -> Option<Interval> {
    let Some(start) = tokio::time::Instant::now().checked_add(period) else {
        warn!("Interval of {:?} is too long, timer disabled", period);
        return None;
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn apply(registry: &Mutex<DeviceRegistry>, event: HotplugEvent) {
    let mut registry = registry.lock().await;
    match event {
        HotplugEvent::Attached(identity) => {
            debug!("Device attached: {}", identity.name);
            registry.attach(identity).await;
        }
        HotplugEvent::Detached(name) => {
            if registry.still_attached(&name) {
                debug!("'{}' detached but another entry remains, still tracking", name);
                return;
            }
            debug!("Device detached: {}", name);
            registry.detach(&name).await;
        }
    }
}

async fn rescan(registry: &Mutex<DeviceRegistry>) {
    let mut registry = registry.lock().await;
    match registry.discover() {
        Ok(discovered) => registry.reconcile(discovered).await,
        Err(err) => warn!("Device discovery failed, retrying next cycle: {}", err),
    }
}

/// Background loop state
struct Worker {
    registry: Arc<Mutex<DeviceRegistry>>,
    events: UnboundedReceiver<HotplugEvent>,
    stop: watch::Receiver<bool>,
    flush: Option<Interval>,
    rescan: Option<Interval>,
}

impl Worker {
    async fn run(mut self) {
        let mut hotplug_open = true;
        loop {
            tokio::select! {
                biased;
                _ = self.stop.changed() => break,
                event = self.events.recv(), if hotplug_open => match event {
                    Some(event) => apply(&self.registry, event).await,
                    None => {
                        warn!("Hotplug notifications closed");
                        hotplug_open = false;
                    }
                },
                _ = tick(&mut self.flush) => {
                    let saved = self.registry.lock().await.flush_all();
                    debug!("Periodic flush saved {} device(s)", saved);
                }
                _ = tick(&mut self.rescan) => rescan(&self.registry).await,
            }
        }
    }
}
