//! Immutable key/value view of configuration at one instant.

use std::collections::{BTreeMap, HashMap, btree_map};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Immutable mapping from configuration key to configuration value.
///
/// Snapshots are never mutated once handed out; every merge produces a new
/// one. Iteration order is sorted by key so logs and test output are stable.
///
/// # Examples
///
/// ```
/// use hotconf::Snapshot;
///
/// let snapshot: Snapshot = [("SERVICE_NAME", "orders")].into_iter().collect();
/// assert_eq!(snapshot.get("SERVICE_NAME"), Some("orders"));
/// assert!(snapshot.get("MISSING").is_none());
/// ```
///
/// Snapshots serialize as a flat string map.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the value stored under `key` when it is present and non-empty.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Indicates whether `key` is present, even with an empty value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indicates whether the snapshot holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Consume the snapshot and return the underlying map.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.entries
    }

    /// Build a snapshot from an owned map without copying.
    pub(crate) const fn from_map(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Snapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for Snapshot {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self::from_map(entries)
    }
}

impl<S: std::hash::BuildHasher> From<HashMap<String, String, S>> for Snapshot {
    fn from(entries: HashMap<String, String, S>) -> Self {
        entries.into_iter().collect()
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
