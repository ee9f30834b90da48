//! # Usage Tracking Module
//!
//! Counters of deliberate user actions per device component, and their
//! persistence.
//!
//! ## Storage
//!
//! Usage data is stored in XDG-compliant locations:
//! - Linux: `~/.local/share/lifecycle/usage/`
//! - macOS: `~/Library/Application Support/lifecycle/usage/`
//! - Windows: `%APPDATA%\lifecycle\usage\`
//!
//! Each device has its own usage file, keyed by its escaped name.
//!
//! ## Data Format
//!
//! ```json
//! {
//!   "A": 1042,
//!   "Left Thumb": 0,
//!   "z": 17
//! }
//! ```

mod record;
mod storage;

pub use record::UsageRecord;
pub use storage::{escape_device_name, unescape_device_name, UsageStore};
