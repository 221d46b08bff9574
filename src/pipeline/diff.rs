//! Snapshot diffing for availability alerts.
//!
//! Only additions are reported: products that were not in the previous
//! snapshot, and sizes that became available on products that were.
//! Removals and price changes are deliberately invisible.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{ItemKey, SnapshotEntry};

/// Sizes that appeared on an already-known product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeAddition {
    /// The entry as observed in the current snapshot
    pub item: SnapshotEntry,
    /// Newly available sizes, sorted
    pub sizes: Vec<String>,
}

/// Additions between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    pub new_products: Vec<SnapshotEntry>,
    pub added_sizes: Vec<SizeAddition>,
}

impl Diff {
    /// Whether anything worth notifying about appeared.
    pub fn has_additions(&self) -> bool {
        !self.new_products.is_empty() || !self.added_sizes.is_empty()
    }
}

/// Entries keyed by [`ItemKey`], remembering first-seen order.
///
/// A later entry with an existing key replaces the earlier one in place.
struct SnapshotIndex<'a> {
    order: Vec<ItemKey>,
    entries: HashMap<ItemKey, &'a SnapshotEntry>,
}

impl<'a> SnapshotIndex<'a> {
    fn build(snapshot: &'a [SnapshotEntry], label: &str) -> Self {
        let mut order = Vec::with_capacity(snapshot.len());
        let mut entries = HashMap::with_capacity(snapshot.len());

        for entry in snapshot {
            let key = entry.key();
            if entries.insert(key.clone(), entry).is_some() {
                log::warn!("Duplicate item key {} in {} snapshot; keeping the later entry", key, label);
            } else {
                order.push(key);
            }
        }

        Self { order, entries }
    }

    fn get(&self, key: &ItemKey) -> Option<&'a SnapshotEntry> {
        self.entries.get(key).copied()
    }

    fn iter(&self) -> impl Iterator<Item = (&ItemKey, &'a SnapshotEntry)> + '_ {
        self.order.iter().map(|key| (key, self.entries[key]))
    }
}

/// Compute the additions from `previous` to `current`.
pub fn compute_diff(previous: &[SnapshotEntry], current: &[SnapshotEntry]) -> Diff {
    let previous_index = SnapshotIndex::build(previous, "previous");
    let current_index = SnapshotIndex::build(current, "current");

    let mut diff = Diff::default();

    for (key, current_entry) in current_index.iter() {
        let Some(previous_entry) = previous_index.get(key) else {
            diff.new_products.push(current_entry.clone());
            continue;
        };

        let before: BTreeSet<&str> = previous_entry.sizes.iter().map(String::as_str).collect();
        let newly_added: Vec<String> = current_entry
            .sizes
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .difference(&before)
            .map(|s| s.to_string())
            .collect();

        if !newly_added.is_empty() {
            diff.added_sizes.push(SizeAddition {
                item: current_entry.clone(),
                sizes: newly_added,
            });
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(pid: &str, sizes: &[&str]) -> SnapshotEntry {
        SnapshotEntry {
            pid: pid.to_string(),
            name: format!("Item {pid}"),
            sale_price: Some(5000.0),
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
            ..SnapshotEntry::default()
        }
    }

    #[test]
    fn test_no_changes() {
        let snapshot = vec![make_entry("1", &["M", "L"]), make_entry("2", &[])];
        let diff = compute_diff(&snapshot, &snapshot);
        assert!(!diff.has_additions());
        assert_eq!(diff, Diff::default());
    }

    #[test]
    fn test_first_run_everything_new() {
        let current = vec![make_entry("1", &["M"]), make_entry("2", &[])];
        let diff = compute_diff(&[], &current);
        assert_eq!(diff.new_products, current);
        assert!(diff.added_sizes.is_empty());
    }

    #[test]
    fn test_size_addition() {
        let previous = vec![make_entry("1", &["M"])];
        let current = vec![make_entry("1", &["L", "M"])];

        let diff = compute_diff(&previous, &current);
        assert!(diff.new_products.is_empty());
        assert_eq!(
            diff.added_sizes,
            vec![SizeAddition {
                item: current[0].clone(),
                sizes: vec!["L".to_string()],
            }]
        );
    }

    #[test]
    fn test_removals_are_invisible() {
        let previous = vec![make_entry("1", &["M", "L"]), make_entry("2", &["S"])];
        let current = vec![make_entry("1", &["M"])];

        let diff = compute_diff(&previous, &current);
        assert!(!diff.has_additions());
    }

    #[test]
    fn test_price_changes_are_ignored() {
        let previous = vec![make_entry("1", &[])];
        let mut changed = make_entry("1", &[]);
        changed.sale_price = Some(1.0);
        changed.name = "Renamed".into();

        let diff = compute_diff(&previous, &[changed]);
        assert!(!diff.has_additions());
    }

    #[test]
    fn test_key_fallback_order() {
        let by_pid = SnapshotEntry {
            pid: "42".into(),
            product_link: "https://example.com/p/42".into(),
            name: "Shell".into(),
            ..SnapshotEntry::default()
        };
        let by_link = SnapshotEntry {
            product_link: "https://example.com/p/42".into(),
            name: "Shell".into(),
            ..SnapshotEntry::default()
        };
        let by_name = SnapshotEntry {
            name: "Shell".into(),
            ..SnapshotEntry::default()
        };

        assert_eq!(by_pid.key(), ItemKey::Pid("42".into()));
        assert_eq!(by_link.key(), ItemKey::Link("https://example.com/p/42".into()));
        assert_eq!(by_name.key(), ItemKey::Name("Shell".into()));

        // Same underlying fields, three distinct identities.
        let current = vec![by_pid.clone(), by_link.clone(), by_name.clone()];
        let diff = compute_diff(&[by_pid], &current);
        assert_eq!(diff.new_products, vec![by_link, by_name]);
    }

    #[test]
    fn test_duplicate_key_keeps_later_entry() {
        let previous = vec![make_entry("1", &["M"])];
        let current = vec![make_entry("1", &["M"]), make_entry("1", &["M", "XL"])];

        let diff = compute_diff(&previous, &current);
        assert_eq!(diff.added_sizes.len(), 1);
        assert_eq!(diff.added_sizes[0].sizes, vec!["XL"]);
    }

    #[test]
    fn test_mixed_changes_keep_current_order() {
        let previous = vec![make_entry("1", &["S"]), make_entry("3", &["M"])];
        let current = vec![
            make_entry("1", &["S", "M"]),
            make_entry("2", &[]),
            make_entry("3", &["M"]),
            make_entry("4", &["L"]),
        ];

        let diff = compute_diff(&previous, &current);
        let new_pids: Vec<&str> = diff.new_products.iter().map(|e| e.pid.as_str()).collect();
        assert_eq!(new_pids, vec!["2", "4"]);
        assert_eq!(diff.added_sizes[0].item.pid, "1");
        assert_eq!(diff.added_sizes[0].sizes, vec!["M"]);
    }
}
