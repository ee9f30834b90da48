//! # Usage Storage
//!
//! Handles persistent storage of per-device usage counters.
//!
//! ## Storage Location
//!
//! ```text
//! ~/.local/share/lifecycle/usage/
//! ├── %58box %57ireless %43ontroller.json
//! ├── %54hrustmaster %54.16000%4D%2F%46%43%53.json
//! └── ...
//! ```
//!
//! Each device has its own JSON file named after the device. Characters that
//! are unsafe in file names are percent-escaped, so the name can be recovered
//! from the file name. Uppercase letters are escaped too: names differing
//! only in case must not share a file on case-insensitive filesystems.

use super::record::UsageRecord;
use crate::error::{Result, TrackerError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const USAGE_EXTENSION: &str = ".json";

/// Directory-backed store of usage records, one file per device.
///
/// Single writer per device name is assumed; the registry guarantees it.
#[derive(Debug, Clone)]
pub struct UsageStore {
    dir: PathBuf,
}

impl UsageStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| TrackerError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the usage file for a device
    pub fn path_for(&self, device_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", escape_device_name(device_name), USAGE_EXTENSION))
    }

    /// Load the persisted record for a device.
    ///
    /// Absence is `Ok(None)`; only unreadable or corrupt files are errors.
    pub fn load(&self, device_name: &str) -> Result<Option<UsageRecord>> {
        let path = self.path_for(device_name);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| TrackerError::io(&path, e))?;
        let record: UsageRecord =
            serde_json::from_str(&content).map_err(|e| TrackerError::CorruptUsage {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "Loaded {} usage entries for '{}' from {}",
            record.len(),
            device_name,
            path.display()
        );
        Ok(Some(record))
    }

    /// Overwrite the persisted record for a device.
    ///
    /// The record is written to a sibling temp file and renamed into place so
    /// a crash mid-write leaves the previous file intact.
    pub fn save(&self, device_name: &str, record: &UsageRecord) -> Result<()> {
        let path = self.path_for(device_name);
        let tmp_path = self.dir.join(format!(
            ".{}{}.tmp",
            escape_device_name(device_name),
            USAGE_EXTENSION
        ));

        let json = serde_json::to_string_pretty(record).map_err(|e| {
            TrackerError::CorruptUsage {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        fs::write(&tmp_path, json).map_err(|e| TrackerError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| TrackerError::io(&path, e))?;

        debug!("Saved {} usage entries for '{}'", record.len(), device_name);
        Ok(())
    }

    /// Names of every device with a usage file, sorted
    pub fn stored_devices(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| TrackerError::io(&self.dir, e))?;

        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|file_name| !file_name.starts_with('.'))
            .filter_map(|file_name| {
                file_name
                    .strip_suffix(USAGE_EXTENSION)
                    .and_then(unescape_device_name)
            })
            .collect();

        names.sort();
        Ok(names)
    }
}

fn is_safe_byte(byte: u8, index: usize) -> bool {
    byte.is_ascii_lowercase()
        || byte.is_ascii_digit()
        || matches!(byte, b' ' | b'-' | b'_')
        || (byte == b'.' && index > 0)
}

/// Escape a device name into a file stem.
///
/// Lowercase ASCII letters, digits, space, `-`, `_` and non-leading `.` are
/// kept; every other byte, uppercase letters included, becomes `%XX`.
pub fn escape_device_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for (index, byte) in name.bytes().enumerate() {
        if is_safe_byte(byte, index) {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

/// Invert [`escape_device_name`]. Returns `None` for stems it could not
/// have produced.
pub fn unescape_device_name(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).ok()
}
