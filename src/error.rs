//! # Error Taxonomy
//!
//! Every failure the tracking core can observe is one of the variants below.
//! None of them is fatal: callers log and degrade (empty device set for a
//! discovery cycle, empty usage record for a device, missing profile).

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tracking core
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The platform layer could not enumerate attached devices
    #[error("Failed to enumerate devices: {0}")]
    Discovery(#[from] PlatformError),

    /// A usage or profile file could not be read or written
    #[error("Failed to access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A usage file exists but does not hold a component -> count object
    #[error("Corrupt usage file {}: {reason}", path.display())]
    CorruptUsage { path: PathBuf, reason: String },

    /// A profile record failed to parse
    #[error("Malformed profile {}: {reason}", path.display())]
    MalformedProfile { path: PathBuf, reason: String },
}

/// Errors reported by a [`Platform`](crate::platform::Platform) backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Platform backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
