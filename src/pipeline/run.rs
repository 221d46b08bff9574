// src/pipeline/run.rs

//! One watch run, end to end.
//!
//! ```text
//! load state -> fetch items -> publish report -> snapshot + diff
//!            -> notify (only with additions) -> save state (always)
//! ```
//!
//! Nothing in here fails the run: every sink degrades on its own and an
//! item source error is treated as an empty listing.

use chrono::{DateTime, Utc};

use crate::models::{Config, PersistedState, RawItem, SnapshotEntry, snapshot_fingerprint};
use crate::pipeline::diff::compute_diff;
use crate::pipeline::report::render_report;
use crate::pipeline::snapshot::build_snapshot;
use crate::pipeline::summary::SummaryFormatter;
use crate::services::{ItemSource, Notifier};
use crate::storage::{ReportPublisher, StateStore};
use crate::utils;

const TOTAL_STEPS: usize = 5;

/// Run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute the summary without publishing, notifying or saving
    pub dry_run: bool,
}

/// Where a run's results go.
pub struct Sinks<'a> {
    pub store: &'a dyn StateStore,
    pub publisher: &'a dyn ReportPublisher,
    pub notifier: &'a dyn Notifier,
}

/// What a run observed and did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub item_count: usize,
    pub new_products: usize,
    pub added_sizes: usize,
    /// Whether a notification was delivered
    pub notified: bool,
    /// Whether the new state was written
    pub state_saved: bool,
    pub report_url: Option<String>,
    /// Whether the snapshot differs from the stored one in any way
    pub snapshot_changed: bool,
    /// Summary text; `None` when there was nothing to report
    pub message: Option<String>,
}

/// Execute one watch run.
pub async fn run_watch(
    config: &Config,
    source: &dyn ItemSource,
    sinks: &Sinks<'_>,
    options: RunOptions,
) -> RunSummary {
    let started = Utc::now();
    let formatter = SummaryFormatter::new(&config.notify);
    utils::log::header(&format!(
        "Discount watch{}",
        if options.dry_run { " (dry run)" } else { "" }
    ));

    utils::log::step(1, TOTAL_STEPS, "Loading previous state");
    let previous = sinks.store.load().await;

    utils::log::step(2, TOTAL_STEPS, &format!("Fetching items from {}", source.describe()));
    let items: Vec<RawItem> = match source.fetch_items().await {
        Ok(items) => items,
        Err(e) => {
            log::error!("Item extraction failed, continuing with an empty listing: {}", e);
            Vec::new()
        }
    };
    utils::log::sub_item(&format!("{} items", items.len()));

    utils::log::step(3, TOTAL_STEPS, "Publishing report");
    let report_url = if options.dry_run {
        utils::log::sub_item("skipped (dry run)");
        None
    } else {
        let html = render_report(
            &items,
            &formatter.local_timestamp(started),
            &config.notify.currency,
        );
        sinks.publisher.publish(&html).await
    };

    utils::log::step(4, TOTAL_STEPS, "Comparing with previous snapshot");
    let snapshot = build_snapshot(&items);
    let diff = compute_diff(&previous.snapshot, &snapshot);
    let fingerprint = snapshot_fingerprint(&snapshot);
    let snapshot_changed = snapshot_fingerprint(&previous.snapshot) != fingerprint;
    utils::log::sub_item(&format!(
        "{} new products, {} newly available sizes",
        diff.new_products.len(),
        diff.added_sizes.len()
    ));

    let mut summary = RunSummary {
        item_count: items.len(),
        new_products: diff.new_products.len(),
        added_sizes: diff.added_sizes.len(),
        report_url: report_url.clone(),
        snapshot_changed,
        ..RunSummary::default()
    };

    if diff.has_additions() {
        let text = formatter.format(&diff, items.len(), report_url.as_deref(), started);
        if options.dry_run {
            log::info!("Dry run; summary not sent");
        } else {
            summary.notified = sinks.notifier.notify(&text).await;
        }
        summary.message = Some(text);
    } else {
        log::info!("No additions; notification skipped");
    }

    utils::log::step(5, TOTAL_STEPS, "Saving state");
    if options.dry_run {
        utils::log::sub_item("skipped (dry run)");
    } else {
        let state = PersistedState::observed_at(snapshot, items.len(), started);
        summary.state_saved = sinks.store.save(&state).await;
    }

    utils::log::summary(
        "Run complete",
        &[
            ("Items", summary.item_count.to_string()),
            ("New products", summary.new_products.to_string()),
            ("Added sizes", summary.added_sizes.to_string()),
            ("Snapshot changed", summary.snapshot_changed.to_string()),
            ("Notified", summary.notified.to_string()),
            ("State saved", summary.state_saved.to_string()),
            (
                "Report",
                summary.report_url.clone().unwrap_or_else(|| "-".into()),
            ),
            (
                "Duration",
                format!("{}ms", (Utc::now() - started).num_milliseconds()),
            ),
        ],
    );

    summary
}

/// Summary of what `current` added over `previous`, using the configured
/// notification format. `None` when nothing was added.
pub fn diff_summary(
    config: &Config,
    previous: &[SnapshotEntry],
    current: &[SnapshotEntry],
    at: DateTime<Utc>,
) -> Option<String> {
    let diff = compute_diff(previous, current);
    diff.has_additions()
        .then(|| SummaryFormatter::new(&config.notify).format(&diff, current.len(), None, at))
}
