//! Canonical snapshot entries and the persisted state blob.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One distinct item in a canonical snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub pid: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub original_price: Option<f64>,

    #[serde(default)]
    pub sale_price: Option<f64>,

    #[serde(default)]
    pub discount_percent: Option<f64>,

    /// Deduplicated and sorted
    #[serde(default)]
    pub sizes: Vec<String>,

    #[serde(default)]
    pub product_link: String,
}

impl SnapshotEntry {
    /// Identity used to match the same product across snapshots.
    ///
    /// Priority: pid, then product link, then name.
    pub fn key(&self) -> ItemKey {
        let pid = self.pid.trim();
        let link = self.product_link.trim();
        if !pid.is_empty() {
            ItemKey::Pid(pid.to_string())
        } else if !link.is_empty() {
            ItemKey::Link(link.to_string())
        } else {
            ItemKey::Name(self.name.trim().to_string())
        }
    }

    /// Name for display, or `(Unnamed)`.
    pub fn display_name(&self) -> &str {
        match self.name.trim() {
            "" => "(Unnamed)",
            name => name,
        }
    }
}

/// Identity key of a snapshot entry.
///
/// Keys of different kinds never compare equal, even when the text matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    Pid(String),
    Link(String),
    Name(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Pid(v) => write!(f, "pid:{v}"),
            ItemKey::Link(v) => write!(f, "url:{v}"),
            ItemKey::Name(v) => write!(f, "name:{v}"),
        }
    }
}

/// Canonical snapshot: entries sorted by `(pid, name, product_link)`.
pub type Snapshot = Vec<SnapshotEntry>;

/// Hex SHA-256 of the snapshot's compact JSON form.
///
/// Two runs that observe the same logical state produce the same fingerprint.
pub fn snapshot_fingerprint(snapshot: &[SnapshotEntry]) -> String {
    let bytes = serde_json::to_vec(snapshot).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// The state blob written once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub snapshot: Snapshot,

    /// When the snapshot was observed; absent for the empty default state
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Number of items observed in the run
    #[serde(default)]
    pub count: usize,

    /// Fingerprint of `snapshot`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl PersistedState {
    pub fn new(snapshot: Snapshot, count: usize) -> Self {
        Self::observed_at(snapshot, count, Utc::now())
    }

    pub fn observed_at(snapshot: Snapshot, count: usize, at: DateTime<Utc>) -> Self {
        let fingerprint = snapshot_fingerprint(&snapshot);
        Self {
            snapshot,
            updated_at: Some(at),
            count,
            fingerprint: Some(fingerprint),
        }
    }

    /// True for the default state returned when nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty() && self.updated_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: &str, link: &str, name: &str) -> SnapshotEntry {
        SnapshotEntry {
            pid: pid.into(),
            product_link: link.into(),
            name: name.into(),
            ..SnapshotEntry::default()
        }
    }

    #[test]
    fn test_key_fallback_order() {
        assert_eq!(
            entry("p1", "https://example.com/a", "A").key(),
            ItemKey::Pid("p1".into())
        );
        assert_eq!(
            entry("", "https://example.com/a", "A").key(),
            ItemKey::Link("https://example.com/a".into())
        );
        assert_eq!(entry("", "", "A").key(), ItemKey::Name("A".into()));
        assert_eq!(entry("  ", " ", " A ").key(), ItemKey::Name("A".into()));
    }

    #[test]
    fn test_key_kinds_do_not_collide() {
        assert_ne!(entry("x", "", "").key(), entry("", "", "x").key());
        assert_eq!(entry("x", "", "").key().to_string(), "pid:x");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(entry("", "", "  ").display_name(), "(Unnamed)");
        assert_eq!(entry("", "", " Vest ").display_name(), "Vest");
    }

    #[test]
    fn test_null_prices_round_trip() {
        let state = PersistedState::new(vec![entry("1", "", "A")], 1);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"sale_price\":null"));

        let back: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.snapshot[0].sale_price, None);
        assert_eq!(back, state);
    }

    #[test]
    fn test_legacy_state_loads() {
        let json = r#"{"snapshot": [{"pid": "1", "name": "A"}], "updated_at": "2025-01-02T03:04:05.123456Z", "count": 1}"#;
        let state: PersistedState = serde_json::from_str(json).unwrap();
        assert_eq!(state.count, 1);
        assert!(state.fingerprint.is_none());
        assert!(state.snapshot[0].sizes.is_empty());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = vec![entry("1", "", "A"), entry("2", "", "B")];
        let b = a.clone();
        assert_eq!(snapshot_fingerprint(&a), snapshot_fingerprint(&b));
        assert_ne!(snapshot_fingerprint(&a), snapshot_fingerprint(&a[..1]));
        assert!(PersistedState::default().is_empty());
    }
}
