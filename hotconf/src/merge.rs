//! Deterministic merging of source snapshots.

use std::collections::BTreeMap;

use crate::Snapshot;

/// Merge `layers` in order, later layers taking precedence.
///
/// A key carried by a later layer with an empty value never replaces a
/// non-empty value contributed by an earlier layer. This keeps a remote store
/// that has not populated a key yet from blanking out an environment default.
/// An empty value for a key no earlier layer set is kept as empty.
///
/// The result is always a fresh snapshot; inputs are left untouched.
///
/// # Examples
///
/// ```
/// use hotconf::{Snapshot, merge_snapshots};
///
/// let env: Snapshot = [("K", "1"), ("A", "env")].into_iter().collect();
/// let remote: Snapshot = [("K", ""), ("A", "remote")].into_iter().collect();
///
/// let merged = merge_snapshots([&env, &remote]);
/// assert_eq!(merged.get("K"), Some("1"));
/// assert_eq!(merged.get("A"), Some("remote"));
/// ```
pub fn merge_snapshots<'a, I>(layers: I) -> Snapshot
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    let mut scratch: BTreeMap<String, String> = BTreeMap::new();
    for layer in layers {
        for (key, value) in layer.iter() {
            if value.is_empty()
                && scratch
                    .get(key)
                    .is_some_and(|existing| !existing.is_empty())
            {
                continue;
            }
            scratch.insert(key.to_owned(), value.to_owned());
        }
    }
    Snapshot::from_map(scratch)
}
