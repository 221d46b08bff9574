//! Discount Watch CLI
//!
//! Local and scheduled-job entry point.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use discount_watch::{
    error::{AppError, Result},
    models::{Config, PersistedState, Snapshot},
    pipeline::{self, RunOptions, Sinks},
    services::{FanoutNotifier, ItemSource, JsonFileSource, ListingSource},
    storage,
    utils::http,
};
use serde::Deserialize;

/// Discount Watch - sale listing change monitor
#[derive(Parser, Debug)]
#[command(
    name = "discount-watch",
    version,
    about = "Reports newly discounted products and newly available sizes"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "watch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one watch cycle: fetch, diff, notify, save
    Run {
        /// Read items from a JSON file instead of crawling the listing
        #[arg(long)]
        items: Option<PathBuf>,

        /// Print the summary without publishing, notifying or saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Diff two state or snapshot files offline
    Diff {
        /// Earlier state or snapshot JSON
        previous: PathBuf,

        /// Later state or snapshot JSON
        current: PathBuf,
    },

    /// Validate the configuration file
    Validate,

    /// Show the persisted state
    Info,
}

/// A bare snapshot array or a full state blob.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Snapshot(Snapshot),
    State(PersistedState),
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let content = std::fs::read_to_string(path)?;
    Ok(match serde_json::from_str::<SnapshotFile>(&content)? {
        SnapshotFile::Snapshot(snapshot) => snapshot,
        SnapshotFile::State(state) => state.snapshot,
    })
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_optional(&cli.config)?;

    match cli.command {
        Command::Run { items, dry_run } => {
            config.validate()?;
            let client = http::create_client(&config.http)?;

            let source: Box<dyn ItemSource> = match items {
                Some(path) => Box::new(JsonFileSource::new(path)),
                None => Box::new(ListingSource::new(client.clone(), &config)?),
            };
            let (store, publisher) = storage::from_config(&config, &client);
            let notifier = FanoutNotifier::from_env(&client, &config.notify);

            let sinks = Sinks {
                store: store.as_ref(),
                publisher: publisher.as_ref(),
                notifier: &notifier,
            };
            let summary =
                pipeline::run_watch(&config, source.as_ref(), &sinks, RunOptions { dry_run })
                    .await;

            if dry_run {
                match &summary.message {
                    Some(message) => println!("{message}"),
                    None => println!("No additions."),
                }
            }
        }

        Command::Diff { previous, current } => {
            let previous = read_snapshot(&previous)?;
            let current = read_snapshot(&current)?;
            match pipeline::diff_summary(&config, &previous, &current, chrono::Utc::now()) {
                Some(text) => println!("{text}"),
                None => println!("No additions ({} items).", current.len()),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let client = http::create_client(&config.http)?;
            let (store, _) = storage::from_config(&config, &client);
            log::info!("State location: {}", store.location());

            match store.fetch_state().await {
                Ok(Some(state)) => {
                    log::info!("Items: {}", state.count);
                    log::info!("Snapshot entries: {}", state.snapshot.len());
                    log::info!(
                        "Last updated: {}",
                        state
                            .updated_at
                            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
                    );
                    log::info!(
                        "Fingerprint: {}",
                        state.fingerprint.as_deref().unwrap_or("-")
                    );
                }
                Ok(None) => log::info!("No state stored yet."),
                Err(e) => {
                    log::error!("Failed to read state: {}", e);
                    return Err(AppError::config(format!(
                        "state at {} is unreadable",
                        store.location()
                    )));
                }
            }
        }
    }

    Ok(())
}
