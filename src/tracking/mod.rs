//! # Tracking Module
//!
//! The usage-tracking engine:
//!
//! 1. **Registry**: discovers devices, drops duplicates and exclusions, and
//!    owns one [`TrackedDevice`] per attached device
//! 2. **Session**: a background task per device that polls and counts uses
//! 3. **Controller**: the facade handed to the UI, which also serializes
//!    hotplug notifications and runs periodic flushes
//!
//! ```text
//! Platform ──hotplug──▶ TrackingController ──▶ DeviceRegistry
//!                                                 │
//!                                   ┌─────────────┼─────────────┐
//!                             PollingSession PollingSession  ...
//!                                   │
//!                               UsageStore (flush)
//! ```

pub mod controller;
pub mod debounce;
pub mod registry;
pub mod session;

pub use controller::TrackingController;
pub use debounce::{UsageCounter, AXIS_SATURATION, RELEASE_VALUE};
pub use registry::{DeviceRegistry, DeviceSnapshot, TrackedDevice};
pub use session::PollingSession;

use std::time::Duration;

/// Timing and counting knobs shared by every session
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    /// Sleep between polls that returned no events
    pub poll_interval: Duration,
    /// Axis value counted as full deflection
    pub axis_saturation: f32,
    /// How often the controller saves every record; `None` disables
    pub flush_interval: Option<Duration>,
    /// How often the controller re-enumerates devices; `None` disables
    pub rescan_interval: Option<Duration>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            axis_saturation: AXIS_SATURATION,
            flush_interval: Some(Duration::from_secs(60)),
            rescan_interval: None,
        }
    }
}
