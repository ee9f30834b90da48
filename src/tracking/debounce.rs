//! Event debounce and per-kind counting rules.
//!
//! Platforms re-deliver the same logical state, and analog inputs jitter.
//! An event for the same component as the previous one is only looked at
//! when both its millisecond timestamp and its value changed. A fresh event
//! then counts as a use when:
//!
//! | Kind | Counted when |
//! |------|--------------|
//! | Button / Key | value is the release value (`0.0`) |
//! | Axis | value equals full deflection, never on wheels |
//!
//! Counting on release means holding a button is one use, not many.

use crate::device::{ComponentKind, DeviceType, InputEvent};
use crate::usage::UsageRecord;
use tracing::debug;

/// Value a button or key reports once released
pub const RELEASE_VALUE: f32 = 0.0;

/// Default full-deflection axis value
pub const AXIS_SATURATION: f32 = 1.0;

/// Debounce state for one device's event stream
#[derive(Debug, Clone)]
pub struct UsageCounter {
    device_type: DeviceType,
    axis_saturation: f32,
    previous: Option<InputEvent>,
}

impl UsageCounter {
    pub fn new(device_type: DeviceType, axis_saturation: f32) -> Self {
        Self {
            device_type,
            axis_saturation,
            previous: None,
        }
    }

    /// Feed a batch of drained events in arrival order, counting uses into
    /// `record`. Returns how many increments were made.
    pub fn process<I>(&mut self, events: I, record: &mut UsageRecord) -> usize
    where
        I: IntoIterator<Item = InputEvent>,
    {
        let mut counted = 0;

        for event in events {
            if self.is_fresh(&event) && self.is_countable(&event) {
                let count = record.increment(&event.component.name);
                debug!(
                    "Incrementing usage of {:?} '{}' (value {}) to {}",
                    event.component.kind, event.component.name, event.value, count
                );
                counted += 1;
            }
            self.previous = Some(event);
        }

        counted
    }

    /// True unless the event repeats the previous one's component with the
    /// same millisecond or the same value
    pub fn is_fresh(&self, event: &InputEvent) -> bool {
        let Some(previous) = &self.previous else {
            return true;
        };

        if previous.component != event.component {
            return true;
        }

        previous.timestamp_millis() != event.timestamp_millis() && previous.value != event.value
    }

    /// Per-kind counting rule, independent of debounce
    pub fn is_countable(&self, event: &InputEvent) -> bool {
        match event.component.kind {
            ComponentKind::Axis => {
                self.device_type != DeviceType::Wheel && event.value == self.axis_saturation
            }
            ComponentKind::Button | ComponentKind::Key => event.value == RELEASE_VALUE,
            ComponentKind::Other => false,
        }
    }
}
