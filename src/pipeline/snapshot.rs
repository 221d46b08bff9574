//! Canonical snapshot construction.
//!
//! Turns best-effort extractor output into entries that compare and
//! serialize deterministically.

use std::collections::BTreeSet;

use crate::models::{RawItem, Snapshot, SnapshotEntry};

/// Normalize one raw item.
///
/// Sizes are trimmed, emptied values dropped, deduplicated and sorted.
/// Missing prices stay `None`.
pub fn canonical_entry(item: &RawItem) -> SnapshotEntry {
    let sizes: BTreeSet<String> = item
        .sizes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    SnapshotEntry {
        pid: item.pid.clone().unwrap_or_default(),
        name: item.name.clone(),
        original_price: item.original_price,
        sale_price: item.sale_price,
        discount_percent: item.discount_percent,
        sizes: sizes.into_iter().collect(),
        product_link: item.product_link.clone().unwrap_or_default(),
    }
}

/// Build a snapshot sorted by `(pid, name, product_link)`.
pub fn build_snapshot(items: &[RawItem]) -> Snapshot {
    let mut snapshot: Snapshot = items.iter().map(canonical_entry).collect();
    snapshot.sort_by(|a, b| {
        (&a.pid, &a.name, &a.product_link).cmp(&(&b.pid, &b.name, &b.product_link))
    });
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pid: Option<&str>, name: &str, sizes: &[&str]) -> RawItem {
        RawItem {
            pid: pid.map(str::to_string),
            name: name.to_string(),
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
            ..RawItem::default()
        }
        .with_prices(Some(10000.0), Some(6000.0))
    }

    #[test]
    fn test_sizes_trimmed_deduped_sorted() {
        let entry = canonical_entry(&item(Some("1"), "Jacket", &[" M ", "L", "", "M", "  "]));
        assert_eq!(entry.sizes, vec!["L", "M"]);
    }

    #[test]
    fn test_missing_prices_stay_null() {
        let raw = RawItem {
            name: "No price".into(),
            ..RawItem::default()
        };
        let entry = canonical_entry(&raw);
        assert_eq!(entry.original_price, None);
        assert_eq!(entry.sale_price, None);
        assert_eq!(entry.discount_percent, None);
        assert_eq!(entry.pid, "");
        assert_eq!(entry.product_link, "");
    }

    #[test]
    fn test_sorted_by_pid_name_link() {
        let items = vec![
            item(Some("b"), "Z", &[]),
            item(None, "Y", &[]),
            item(Some("a"), "X", &[]),
            item(None, "A", &[]),
        ];
        let snapshot = build_snapshot(&items);
        let order: Vec<(&str, &str)> = snapshot
            .iter()
            .map(|e| (e.pid.as_str(), e.name.as_str()))
            .collect();
        assert_eq!(order, vec![("", "A"), ("", "Y"), ("a", "X"), ("b", "Z")]);
    }

    #[test]
    fn test_deterministic_under_shuffle() {
        let items = vec![
            item(Some("3"), "Fleece", &["S", "M"]),
            item(Some("1"), "Vest", &["L"]),
            item(None, "Cap", &[]),
            item(Some("2"), "Shell", &["XL", "M", "XL"]),
        ];
        let mut shuffled = items.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);

        let a = build_snapshot(&items);
        let b = build_snapshot(&shuffled);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
