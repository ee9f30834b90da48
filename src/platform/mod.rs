//! # Platform Layer
//!
//! The tracking core never talks to HID APIs directly. Everything it needs
//! from the host is behind [`Platform`]:
//!
//! | Call | Used by |
//! |------|---------|
//! | `list_attached_devices` | registry discovery |
//! | `poll` / `drain_events` | polling sessions, once per tick |
//! | `subscribe` | controller hotplug loop |
//!
//! [`MemoryPlatform`] is an in-process implementation driven by method calls;
//! native backends implement the same trait.

mod memory;

pub use memory::MemoryPlatform;

use crate::device::{DeviceIdentity, InputEvent};
use crate::error::PlatformError;
use tokio::sync::mpsc::UnboundedReceiver;

/// Attach/detach notification from the platform layer
#[derive(Debug, Clone, PartialEq)]
pub enum HotplugEvent {
    Attached(DeviceIdentity),
    Detached(String),
}

/// Host device access.
///
/// Calls are expected to return promptly; a session cannot interrupt a
/// `poll` that blocks.
pub trait Platform: Send + Sync {
    /// All currently attached devices, in platform order (may repeat names)
    fn list_attached_devices(&self) -> Result<Vec<DeviceIdentity>, PlatformError>;

    /// Refresh the input state of a device
    fn poll(&self, device_name: &str) -> Result<(), PlatformError>;

    /// Take every queued event for a device, oldest first
    fn drain_events(&self, device_name: &str) -> Result<Vec<InputEvent>, PlatformError>;

    /// Register for attach/detach notifications
    fn subscribe(&self) -> UnboundedReceiver<HotplugEvent>;
}
