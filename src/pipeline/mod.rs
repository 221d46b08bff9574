//! Pipeline stages of a watch run.
//!
//! - `snapshot`: Normalize raw items into a canonical snapshot
//! - `diff`: Detect new products and newly available sizes
//! - `summary`: Render a chat-sized summary of a diff
//! - `report`: Render the full listing as HTML
//! - `run`: Wire one run end to end

pub mod diff;
pub mod report;
pub mod run;
pub mod snapshot;
pub mod summary;

pub use diff::{Diff, SizeAddition, compute_diff};
pub use report::render_report;
pub use run::{RunOptions, RunSummary, Sinks, diff_summary, run_watch};
pub use snapshot::{build_snapshot, canonical_entry};
pub use summary::{SummaryFormatter, format_summary, truncate_message};
