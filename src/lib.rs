//! Lifecycle - usage tracking for gamepads, wheels, pedals, sticks and keyboards
//!
//! This library counts deliberate uses of every button, key and axis on the
//! attached input devices and persists the counts per device, so worn-out
//! hardware can be spotted and compared over time.

pub mod config;
pub mod device;
pub mod error;
pub mod platform;
pub mod replay;
pub mod tracking;
pub mod usage;

pub use error::{PlatformError, Result, TrackerError};
