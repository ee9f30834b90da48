//! Per-device usage counters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Mapping of component identifier name to the number of counted uses.
///
/// Counters only ever grow. Keys are kept once created, including zero
/// placeholders, so later uses increment the existing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageRecord {
    counts: BTreeMap<String, u64>,
}

impl UsageRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one use of `component`, creating the entry at zero first
    pub fn increment(&mut self, component: &str) -> u64 {
        let count = self.counts.entry(component.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn get(&self, component: &str) -> u64 {
        self.counts.get(component).copied().unwrap_or(0)
    }

    pub fn contains(&self, component: &str) -> bool {
        self.counts.contains_key(component)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counters
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Most used components, sorted by count (descending) then name
    pub fn most_used(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(limit);
        entries
    }
}

impl FromIterator<(String, u64)> for UsageRecord {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

impl Serialize for UsageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.counts.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UsageRecord {
    /// `null` counts load as zero placeholders
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<u64>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or(0)))
            .collect())
    }
}
