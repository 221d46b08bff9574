//! Storage abstractions for run state and the published report.
//!
//! The state blob is read once at the start of a run and replaced once at
//! the end. Both operations are best-effort: a store that cannot be read
//! behaves like an empty one, and a failed write is only logged.
//!
//! ## Backends
//!
//! ```text
//! gist   # GitHub gists located by description (state private, report public)
//! local  # {local_dir}/discount_state.json and {local_dir}/discounted_products.html
//! ```

pub mod gist;
pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Config, PersistedState, StorageBackend};

// Re-export for convenience
pub use gist::{GistClient, GistReportPublisher, GistStateStore};
pub use local::LocalStore;

/// Persists the last observed snapshot.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Human-readable location, for logs.
    fn location(&self) -> String;

    /// Read the stored state; `Ok(None)` when nothing was stored yet.
    async fn fetch_state(&self) -> Result<Option<PersistedState>>;

    /// Replace the stored state.
    async fn store_state(&self, state: &PersistedState) -> Result<()>;

    /// Fetch-or-default: any failure yields the empty state.
    async fn load(&self) -> PersistedState {
        match self.fetch_state().await {
            Ok(Some(state)) => {
                log::info!(
                    "Loaded previous state from {} ({} entries)",
                    self.location(),
                    state.snapshot.len()
                );
                state
            }
            Ok(None) => {
                log::info!("No previous state at {}; treating all items as new", self.location());
                PersistedState::default()
            }
            Err(e) => {
                log::warn!(
                    "Failed to load previous state from {}: {}. Treating all items as new",
                    self.location(),
                    e
                );
                PersistedState::default()
            }
        }
    }

    /// Best-effort write; returns whether it succeeded.
    async fn save(&self, state: &PersistedState) -> bool {
        match self.store_state(state).await {
            Ok(()) => {
                log::info!("State saved to {} ({} entries)", self.location(), state.count);
                true
            }
            Err(e) => {
                log::error!("Failed to save state to {}: {}", self.location(), e);
                false
            }
        }
    }
}

/// Publishes the HTML listing and returns a URL that points at it.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish_report(&self, html: &str) -> Result<String>;

    /// Best-effort publish; `None` when it failed.
    async fn publish(&self, html: &str) -> Option<String> {
        match self.publish_report(html).await {
            Ok(url) => {
                log::info!("Report published: {}", url);
                Some(url)
            }
            Err(e) => {
                log::error!("Failed to publish report: {}", e);
                None
            }
        }
    }
}

/// Build the configured state store and report publisher.
pub fn from_config(
    config: &Config,
    client: &reqwest::Client,
) -> (Box<dyn StateStore>, Box<dyn ReportPublisher>) {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Local => (
            Box::new(LocalStore::new(
                &storage.local_dir,
                &storage.state_file,
                &storage.report_file,
            )),
            Box::new(LocalStore::new(
                &storage.local_dir,
                &storage.state_file,
                &storage.report_file,
            )),
        ),
        StorageBackend::Gist => {
            let gist = GistClient::from_env(client.clone(), &storage.gist_api);
            (
                Box::new(GistStateStore::new(
                    gist.clone(),
                    &storage.state_description,
                    &storage.state_file,
                )),
                Box::new(GistReportPublisher::new(
                    gist,
                    &storage.report_description,
                    &storage.report_file,
                )),
            )
        }
    }
}
