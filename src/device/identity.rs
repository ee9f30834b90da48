//! Device and input-event types as reported by the platform layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of device as declared by the platform layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeviceType {
    Gamepad,
    Wheel,
    Stick,
    Rudder,
    Keyboard,
    Mouse,
    Trackball,
    Trackpad,
    Headtracker,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Gamepad => "Gamepad",
            DeviceType::Wheel => "Wheel",
            DeviceType::Stick => "Stick",
            DeviceType::Rudder => "Rudder",
            DeviceType::Keyboard => "Keyboard",
            DeviceType::Mouse => "Mouse",
            DeviceType::Trackball => "Trackball",
            DeviceType::Trackpad => "Trackpad",
            DeviceType::Headtracker => "Headtracker",
            DeviceType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = ();

    /// Case-insensitive parse, used for profile-declared types
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_lowercase().as_str() {
            "gamepad" => DeviceType::Gamepad,
            "wheel" => DeviceType::Wheel,
            "stick" => DeviceType::Stick,
            "rudder" => DeviceType::Rudder,
            "keyboard" => DeviceType::Keyboard,
            "mouse" => DeviceType::Mouse,
            "trackball" => DeviceType::Trackball,
            "trackpad" => DeviceType::Trackpad,
            "headtracker" => DeviceType::Headtracker,
            "unknown" => DeviceType::Unknown,
            _ => return Err(()),
        };
        Ok(ty)
    }
}

/// Port a device is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PortType {
    Usb,
    Bluetooth,
    Serial,
    Gameport,
    I8042,
    Network,
    #[default]
    Unknown,
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortType::Usb => "USB port",
            PortType::Bluetooth => "Bluetooth",
            PortType::Serial => "Serial port",
            PortType::Gameport => "Game port",
            PortType::I8042 => "i8042 (PS/2)",
            PortType::Network => "Network",
            PortType::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A device as the platform layer reports it on attach.
///
/// `name` is the only stable key; the platform does not guarantee a numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: DeviceType,
    #[serde(default)]
    pub port_type: PortType,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, device_type: DeviceType, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            device_type,
            port_type,
        }
    }
}

/// What sort of input element an event comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Axis,
    Button,
    Key,
    /// Anything the platform exposes that is not counted (LEDs, rumble, ...)
    Other,
}

/// A single trackable input element on a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    /// Identifier name, unique per device (`"A"`, `"x"`, `"Space"`)
    pub name: String,
    pub kind: ComponentKind,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn button(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Button)
    }

    pub fn axis(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Axis)
    }

    pub fn key(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Key)
    }
}

/// One queued input event drained from a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub component: Component,
    pub value: f32,
    pub timestamp_nanos: u64,
}

impl InputEvent {
    pub fn new(component: Component, value: f32, timestamp_nanos: u64) -> Self {
        Self {
            component,
            value,
            timestamp_nanos,
        }
    }

    /// Timestamp truncated to whole milliseconds
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp_nanos / 1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_from_str_is_case_insensitive() {
        assert_eq!("wheel".parse::<DeviceType>(), Ok(DeviceType::Wheel));
        assert_eq!(" Gamepad ".parse::<DeviceType>(), Ok(DeviceType::Gamepad));
        assert_eq!("KEYBOARD".parse::<DeviceType>(), Ok(DeviceType::Keyboard));
        assert!("hovercraft".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_timestamp_millis_truncates() {
        let event = InputEvent::new(Component::button("A"), 0.0, 1_999_999);
        assert_eq!(event.timestamp_millis(), 1);
        let event = InputEvent::new(Component::button("A"), 0.0, 2_000_000);
        assert_eq!(event.timestamp_millis(), 2);
    }

    #[test]
    fn test_identity_deserializes_with_defaults() {
        let identity: DeviceIdentity = serde_json::from_str(r#"{"name": "PadX"}"#).unwrap();
        assert_eq!(identity.name, "PadX");
        assert_eq!(identity.device_type, DeviceType::Unknown);
        assert_eq!(identity.port_type, PortType::Unknown);
    }
}
