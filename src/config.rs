//! # Configuration Persistence
//!
//! Manages user configuration stored in `~/.config/lifecycle/config.json`.
//!
//! ## Overview
//!
//! Every field is optional in the file; missing fields take their defaults.
//! Directory fields left unset resolve to platform data locations:
//!
//! ```text
//! ~/.local/share/lifecycle/usage/        usage files
//! ~/.local/share/lifecycle/profiles/     device profiles
//! ~/.config/lifecycle/exclusions.txt     device exclusions
//! ```
//!
//! The `directories` crate is used to resolve the platform-appropriate
//! directories.

use crate::tracking::{TrackerSettings, AXIS_SATURATION};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "lifecycle";

/// Longest accepted flush or rescan interval (one week)
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted poll interval; stopping a session waits up to this long
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Persisted tracker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Root for usage data; defaults to the platform data directory
    pub data_dir: Option<PathBuf>,
    /// Profile catalog directory; defaults to `<data_dir>/profiles`
    pub profiles_dir: Option<PathBuf>,
    /// Exclusions file; defaults to `<config_dir>/exclusions.txt`
    pub exclusions_file: Option<PathBuf>,
    /// Sleep between empty polls, in milliseconds
    pub poll_interval_ms: u64,
    /// Periodic flush interval in seconds, 0 disables
    pub flush_interval_secs: u64,
    /// Periodic re-enumeration interval in seconds, 0 disables
    pub rescan_interval_secs: u64,
    /// Axis value counted as full deflection
    pub axis_saturation: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            profiles_dir: None,
            exclusions_file: None,
            poll_interval_ms: 10,
            flush_interval_secs: 60,
            rescan_interval_secs: 0,
            axis_saturation: AXIS_SATURATION,
        }
    }
}

impl Config {
    /// Load configuration from a specific path. Returns `Config::default()` if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.axis_saturation.is_finite() && self.axis_saturation > 0.0) {
            anyhow::bail!(
                "axis_saturation must be a positive number, got {}",
                self.axis_saturation
            );
        }
        if !(1..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            anyhow::bail!(
                "poll_interval_ms must be between 1 and {}, got {}",
                MAX_POLL_INTERVAL_MS,
                self.poll_interval_ms
            );
        }
        for (field, secs) in [
            ("flush_interval_secs", self.flush_interval_secs),
            ("rescan_interval_secs", self.rescan_interval_secs),
        ] {
            if secs > MAX_INTERVAL_SECS {
                anyhow::bail!("{} must be at most {}, got {}", field, MAX_INTERVAL_SECS, secs);
            }
        }
        Ok(())
    }

    /// Return the path to the config file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.json"))
    }

    /// Root data directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }

    /// Directory holding one usage file per device
    pub fn usage_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("usage"))
    }

    pub fn profiles_dir(&self) -> Result<PathBuf> {
        match &self.profiles_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("profiles")),
        }
    }

    pub fn exclusions_file(&self) -> Result<PathBuf> {
        match &self.exclusions_file {
            Some(file) => Ok(file.clone()),
            None => Ok(project_dirs()?.config_dir().join("exclusions.txt")),
        }
    }

    /// Timing and counting settings for the tracking engine
    pub fn tracker_settings(&self) -> TrackerSettings {
        let seconds = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        TrackerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            axis_saturation: self.axis_saturation,
            flush_interval: seconds(self.flush_interval_secs),
            rescan_interval: seconds(self.rescan_interval_secs),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .context("Could not determine application directories")
}
