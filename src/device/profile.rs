//! # Profile Catalog
//!
//! Static device metadata that the platform layer does not supply. Profiles
//! are authored outside this program, one JSON record per file:
//!
//! ```json
//! {
//!   "DeviceName": "Fanatec CSL Elite Pedals",
//!   "DeviceDescription": "Load cell pedal set",
//!   "DeviceManufacturer": "Fanatec",
//!   "DeviceType": "Rudder",
//!   "DevicePortType": "USB port"
//! }
//! ```
//!
//! The catalog is loaded once and never written.

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Descriptive metadata for one device model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    #[serde(rename = "DeviceName")]
    pub name: String,
    #[serde(rename = "DeviceDescription", default)]
    pub description: Option<String>,
    #[serde(rename = "DeviceManufacturer", default)]
    pub manufacturer: Option<String>,
    #[serde(rename = "DeviceType", default)]
    pub device_type: Option<String>,
    #[serde(rename = "DevicePortType", default)]
    pub port_type: Option<String>,
}

/// Read-only lookup of profiles keyed by device name
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: HashMap<String, DeviceProfile>,
}

impl ProfileCatalog {
    /// Scan `profiles_dir` for profile records.
    ///
    /// A missing directory yields an empty catalog. Unreadable or malformed
    /// records are logged and skipped; they never abort the scan.
    pub fn load_all(profiles_dir: &Path) -> Self {
        let mut profiles = HashMap::new();

        if !profiles_dir.is_dir() {
            debug!(
                "Profile directory {} not present, no profiles loaded",
                profiles_dir.display()
            );
            return Self { profiles };
        }

        for entry in WalkDir::new(profiles_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Failed to read profile directory entry: {}", err);
                    None
                }
            })
        {
            let path = entry.path();
            if !path.is_file() || !is_json(path) {
                continue;
            }

            match load_profile(path) {
                Ok(profile) => {
                    if profiles.contains_key(&profile.name) {
                        warn!(
                            "Duplicate profile for '{}' in {}, keeping the first",
                            profile.name,
                            path.display()
                        );
                        continue;
                    }
                    profiles.insert(profile.name.clone(), profile);
                }
                Err(err) => warn!("Skipping profile: {}", err),
            }
        }

        info!(
            "Loaded {} device profile(s) from {}",
            profiles.len(),
            profiles_dir.display()
        );
        Self { profiles }
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = DeviceProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, device_name: &str) -> Option<&DeviceProfile> {
        self.profiles.get(device_name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Load a single profile record
pub fn load_profile(path: &Path) -> Result<DeviceProfile> {
    let content = fs::read_to_string(path).map_err(|e| TrackerError::io(path, e))?;

    let profile: DeviceProfile =
        serde_json::from_str(&content).map_err(|e| TrackerError::MalformedProfile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if profile.name.trim().is_empty() {
        return Err(TrackerError::MalformedProfile {
            path: path.to_path_buf(),
            reason: "DeviceName is empty".to_string(),
        });
    }

    Ok(profile)
}
