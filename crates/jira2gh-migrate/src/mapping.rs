//! Source-key to target-number mapping registry.

use std::collections::HashMap;
use tracing::warn;

/// Registry of source issue keys to target-assigned issue numbers.
///
/// Grows monotonically during pass 1 (one entry per successfully created
/// issue) and is read-only during pass 2. An entry, once present, is never
/// removed or changed; a key is absent exactly when creation of that issue
/// has not yet succeeded.
#[derive(Debug, Clone, Default)]
pub struct IssueMapping {
    entries: HashMap<String, u64>,
}

impl IssueMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key-to-number entry. First write wins: re-recording the same
    /// pair is a no-op, and a conflicting re-record is ignored with a warning.
    pub fn record(&mut self, key: impl Into<String>, number: u64) {
        let key = key.into();
        if let Some(existing) = self.entries.get(&key) {
            if *existing != number {
                warn!("Ignoring remap of {key}: already mapped to #{existing}, got #{number}");
            }
            return;
        }
        self.entries.insert(key, number);
    }

    /// Look up the target number for a source key.
    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }

    /// Check whether a key has been mapped.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, u64)> for IssueMapping {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (key, number) in iter {
            mapping.record(key, number);
        }
        mapping
    }
}
