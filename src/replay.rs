//! # Replay Scripts
//!
//! Drives a [`MemoryPlatform`] from a JSON script so the whole tracking
//! pipeline can be exercised without hardware:
//!
//! ```json
//! {
//!   "steps": [
//!     { "attach": { "name": "PadX", "type": "Gamepad", "port_type": "Usb" } },
//!     { "events": { "device": "PadX", "events": [
//!         { "component": "A", "kind": "Button", "value": 1.0, "timestamp_ms": 10 },
//!         { "component": "A", "kind": "Button", "value": 0.0, "timestamp_ms": 12 }
//!     ] } },
//!     { "wait_ms": 50 },
//!     "toggle",
//!     "flush",
//!     { "detach": "PadX" }
//!   ]
//! }
//! ```

use crate::device::{Component, ComponentKind, DeviceIdentity, InputEvent};
use crate::platform::MemoryPlatform;
use crate::tracking::TrackingController;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest time to wait for a running session to drain pushed events
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayScript {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Plug a device in (with hotplug notification)
    Attach(DeviceIdentity),
    /// Unplug a device by name
    Detach(String),
    /// Queue input events on a device
    Events {
        device: String,
        events: Vec<ScriptEvent>,
    },
    /// Sleep
    WaitMs(u64),
    /// Flip global tracking
    Toggle,
    /// Save every tracked record
    Flush,
    /// Re-enumerate attached devices
    Rescan,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptEvent {
    pub component: String,
    pub kind: ComponentKind,
    pub value: f32,
    pub timestamp_ms: u64,
}

impl From<ScriptEvent> for InputEvent {
    fn from(event: ScriptEvent) -> Self {
        InputEvent::new(
            Component::new(event.component, event.kind),
            event.value,
            event.timestamp_ms.saturating_mul(1_000_000),
        )
    }
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse replay script: {}", path.display()))
    }

    /// Apply every step in order.
    ///
    /// Hotplug notifications are applied by the controller's background
    /// loop; each attach/detach step waits until the tracked set reflects it.
    pub async fn run(&self, platform: &MemoryPlatform, controller: &TrackingController) {
        for (index, step) in self.steps.iter().enumerate() {
            info!("Replay step {}: {:?}", index + 1, step);
            match step {
                Step::Attach(identity) => {
                    platform.attach(identity.clone());
                    settle(controller, &identity.name, true).await;
                }
                Step::Detach(name) => {
                    platform.detach(name);
                    settle(controller, name, false).await;
                }
                Step::Events { device, events } => {
                    let events = events.iter().cloned().map(InputEvent::from);
                    if !platform.push_events(device, events) {
                        warn!("Replay events for unattached device '{}' dropped", device);
                        continue;
                    }
                    drain(platform, controller, device).await;
                }
                Step::WaitMs(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
                Step::Toggle => {
                    controller.toggle_all().await;
                }
                Step::Flush => {
                    controller.flush().await;
                }
                Step::Rescan => controller.rescan().await,
            }
        }
    }
}

/// Wait for the controller loop to apply a hotplug notification. Excluded
/// devices never appear, so this gives up after [`DRAIN_TIMEOUT`].
async fn settle(controller: &TrackingController, name: &str, attached: bool) {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while Instant::now() < deadline {
        let tracked = controller.list().await.iter().any(|d| d.name() == name);
        if tracked == attached {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until a running session has taken every pushed event
async fn drain(platform: &MemoryPlatform, controller: &TrackingController, device: &str) {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while platform.pending(device) > 0 {
        let running = controller
            .list()
            .await
            .iter()
            .any(|d| d.name() == device && d.is_tracking);
        if !running || Instant::now() >= deadline {
            warn!(
                "{} event(s) for '{}' left unprocessed",
                platform.pending(device),
                device
            );
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
