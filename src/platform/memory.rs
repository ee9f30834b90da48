//! In-process platform whose devices and events are supplied by the caller.

use super::{HotplugEvent, Platform};
use crate::device::{DeviceIdentity, InputEvent};
use crate::error::PlatformError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Default)]
struct State {
    /// Attached devices in attach order; duplicate names are allowed, as
    /// real HID stacks report composite devices more than once
    devices: Vec<DeviceIdentity>,
    queues: HashMap<String, VecDeque<InputEvent>>,
    subscribers: Vec<UnboundedSender<HotplugEvent>>,
    discovery_failure: Option<String>,
}

impl State {
    fn is_attached(&self, name: &str) -> bool {
        self.devices.iter().any(|d| d.name == name)
    }

    fn notify(&mut self, event: &HotplugEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Scriptable [`Platform`]
#[derive(Default)]
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plug a device in and notify subscribers
    pub fn attach(&self, identity: DeviceIdentity) {
        let mut state = self.state();
        state.queues.entry(identity.name.clone()).or_default();
        state.devices.push(identity.clone());
        state.notify(&HotplugEvent::Attached(identity));
    }

    /// Add a device without a notification, as if it was present at startup
    pub fn insert(&self, identity: DeviceIdentity) {
        let mut state = self.state();
        state.queues.entry(identity.name.clone()).or_default();
        state.devices.push(identity);
    }

    /// Unplug every device with this name, dropping queued events
    pub fn detach(&self, device_name: &str) {
        let mut state = self.state();
        state.devices.retain(|d| d.name != device_name);
        state.queues.remove(device_name);
        state.notify(&HotplugEvent::Detached(device_name.to_string()));
    }

    /// Unplug one entry of a device reported more than once, and notify.
    /// Queued events are kept while another entry with the name remains.
    pub fn detach_one(&self, device_name: &str) {
        let mut state = self.state();
        if let Some(index) = state.devices.iter().position(|d| d.name == device_name) {
            state.devices.remove(index);
        }
        if !state.is_attached(device_name) {
            state.queues.remove(device_name);
        }
        state.notify(&HotplugEvent::Detached(device_name.to_string()));
    }

    /// Queue events for an attached device. Returns false if it is not attached.
    pub fn push_events(
        &self,
        device_name: &str,
        events: impl IntoIterator<Item = InputEvent>,
    ) -> bool {
        let mut state = self.state();
        if !state.is_attached(device_name) {
            return false;
        }
        state
            .queues
            .entry(device_name.to_string())
            .or_default()
            .extend(events);
        true
    }

    /// Make enumeration fail with `message` until cleared with `None`
    pub fn fail_discovery(&self, message: Option<&str>) {
        self.state().discovery_failure = message.map(str::to_string);
    }

    /// Number of events still queued for a device
    pub fn pending(&self, device_name: &str) -> usize {
        self.state().queues.get(device_name).map_or(0, VecDeque::len)
    }
}

impl Platform for MemoryPlatform {
    fn list_attached_devices(&self) -> Result<Vec<DeviceIdentity>, PlatformError> {
        let state = self.state();
        if let Some(message) = &state.discovery_failure {
            return Err(PlatformError::Backend(message.clone()));
        }
        Ok(state.devices.clone())
    }

    fn poll(&self, device_name: &str) -> Result<(), PlatformError> {
        if !self.state().is_attached(device_name) {
            return Err(PlatformError::DeviceNotFound(device_name.to_string()));
        }
        Ok(())
    }

    fn drain_events(&self, device_name: &str) -> Result<Vec<InputEvent>, PlatformError> {
        let mut state = self.state();
        if !state.is_attached(device_name) {
            return Err(PlatformError::DeviceNotFound(device_name.to_string()));
        }
        Ok(state
            .queues
            .get_mut(device_name)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default())
    }

    fn subscribe(&self) -> UnboundedReceiver<HotplugEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Component, DeviceType, PortType};

    fn pad(name: &str) -> DeviceIdentity {
        DeviceIdentity::new(name, DeviceType::Gamepad, PortType::Usb)
    }

    #[test]
    fn test_attach_notifies_subscribers() {
        let platform = MemoryPlatform::new();
        let mut rx = platform.subscribe();

        platform.attach(pad("PadX"));
        platform.detach("PadX");

        assert_eq!(rx.try_recv().unwrap(), HotplugEvent::Attached(pad("PadX")));
        assert_eq!(
            rx.try_recv().unwrap(),
            HotplugEvent::Detached("PadX".to_string())
        );
    }

    #[test]
    fn test_drain_returns_events_in_order() {
        let platform = MemoryPlatform::new();
        platform.insert(pad("PadX"));

        let events = vec![
            InputEvent::new(Component::button("A"), 1.0, 1),
            InputEvent::new(Component::button("A"), 0.0, 2),
        ];
        assert!(platform.push_events("PadX", events.clone()));

        assert_eq!(platform.drain_events("PadX").unwrap(), events);
        assert!(platform.drain_events("PadX").unwrap().is_empty());
    }

    #[test]
    fn test_vanished_device_is_not_found() {
        let platform = MemoryPlatform::new();
        assert_eq!(
            platform.poll("Ghost"),
            Err(PlatformError::DeviceNotFound("Ghost".to_string()))
        );
        assert!(!platform.push_events("Ghost", Vec::new()));
    }

    #[test]
    fn test_detach_one_keeps_other_entries() {
        let platform = MemoryPlatform::new();
        platform.insert(pad("Composite"));
        platform.insert(pad("Composite"));
        let event = InputEvent::new(Component::key("A"), 0.0, 1);
        assert!(platform.push_events("Composite", vec![event]));

        platform.detach_one("Composite");
        assert_eq!(platform.list_attached_devices().unwrap().len(), 1);
        assert_eq!(platform.pending("Composite"), 1);

        platform.detach_one("Composite");
        assert!(platform.list_attached_devices().unwrap().is_empty());
        assert_eq!(platform.pending("Composite"), 0);
    }

    #[test]
    fn test_discovery_failure_toggle() {
        let platform = MemoryPlatform::new();
        platform.insert(pad("PadX"));
        platform.fail_discovery(Some("enumeration timed out"));
        assert!(platform.list_attached_devices().is_err());

        platform.fail_discovery(None);
        assert_eq!(platform.list_attached_devices().unwrap().len(), 1);
    }
}
