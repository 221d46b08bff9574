// src/models/mod.rs

//! Domain models for the watcher.
//!
//! Raw extractor output, canonical snapshots with their persisted form,
//! and the TOML configuration.

mod config;
mod item;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, FilterConfig, HttpConfig, NotifyConfig, PriceStrategy, SourceConfig, StorageBackend,
    StorageConfig,
};
pub use item::{RawItem, discount_percent, parse_price};
pub use snapshot::{ItemKey, PersistedState, Snapshot, SnapshotEntry, snapshot_fingerprint};
