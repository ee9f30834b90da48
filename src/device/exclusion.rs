//! # Device Exclusions
//!
//! Devices that should never be tracked: lighting controllers, fan hubs,
//! generic HID collections with nothing worth counting.
//!
//! The exclusion file holds one pattern per line:
//!
//! ```text
//! # exact names
//! Corsair Commander Core
//! AURA LED Controller
//! # whole-name regular expressions
//! regex:^HID-compliant (vendor|consumer).*$
//! ```

use super::identity::{DeviceIdentity, DeviceType};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

const REGEX_PREFIX: &str = "regex:";

/// Set of device-name patterns loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    names: HashSet<String>,
    patterns: Vec<Regex>,
}

impl ExclusionSet {
    /// Load exclusions from a file. A missing or unreadable file yields an
    /// empty set.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(set) => set,
            Err(err) => {
                warn!("Failed to load device exclusions: {:#}", err);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read exclusions file: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Parse exclusion lines; invalid regular expressions are skipped
    pub fn parse(content: &str) -> Self {
        let mut set = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(expr) = line.strip_prefix(REGEX_PREFIX) {
                match Regex::new(&format!("^(?:{})$", expr.trim())) {
                    Ok(re) => set.patterns.push(re),
                    Err(err) => warn!("Ignoring invalid exclusion pattern '{}': {}", expr, err),
                }
            } else {
                set.names.insert(line.to_string());
            }
        }

        set
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            patterns: Vec::new(),
        }
    }

    /// True if the name is listed or matches a pattern
    pub fn matches(&self, name: &str) -> bool {
        self.names.contains(name) || self.patterns.iter().any(|re| re.is_match(name))
    }

    /// Decide whether a discovered device is kept out of tracking.
    ///
    /// A listed device is excluded, except that a device declared `Keyboard`
    /// or `Mouse` escapes the list when its name also says "keyboard" or
    /// "mouse". The type field is unreliable for composite HID devices, so
    /// the type alone is not enough to keep a listed device.
    pub fn excludes(&self, identity: &DeviceIdentity) -> bool {
        if !self.matches(&identity.name) {
            return false;
        }

        let lowered = identity.name.to_lowercase();
        match identity.device_type {
            DeviceType::Keyboard => !lowered.contains("keyboard"),
            DeviceType::Mouse => !lowered.contains("mouse"),
            _ => true,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
