//! download-bot — mirrors a listing into a local JSON record store.
//!
//! One store file per (kind, target) pair, e.g. `submissions-ireland.json`,
//! keyed by each item's fullname.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use reddit_ticker_bot::config::{CONFIG_PATH, FileConfigStore};
use reddit_ticker_bot::jobs::download::{DEFAULT_MAX_PAGES, DownloadJob, ListingSource};
use reddit_ticker_bot::store::{JsonFileStore, RecordStore};
use reddit_ticker_bot::types::DEFAULT_LIMIT;
use reddit_ticker_bot::{build_loop, cancel_on_ctrl_c, logging};

#[derive(Parser)]
#[command(name = "download-bot", about = "Download Reddit listings into a local store")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Directory for the record store files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Items per page (max 100)
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: u32,

    /// Subreddit pages to walk before restarting from the newest item
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: u32,

    /// Override the cycle interval in seconds (defaults to `default.timeout`)
    #[arg(long)]
    interval: Option<u64>,

    #[command(subcommand)]
    source: Source,
}

#[derive(Subcommand)]
enum Source {
    /// New submissions of a subreddit
    Subreddit { name: String },
    /// Comment history of a user
    UserComments { username: String },
    /// Submission history of a user
    UserSubmissions { username: String },
}

impl From<Source> for ListingSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Subreddit { name } => ListingSource::Subreddit(name),
            Source::UserComments { username } => ListingSource::UserComments(username),
            Source::UserSubmissions { username } => ListingSource::UserSubmissions(username),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    if !(1..=100).contains(&args.limit) {
        anyhow::bail!("--limit must be between 1 and 100");
    }

    let store = FileConfigStore::open(&args.config)?;
    let _log_guard = logging::init(&store.config().logging)?;
    info!("Loaded config from {}", args.config.display());

    let interval = args.interval.unwrap_or(store.config().default.timeout);
    let source = ListingSource::from(args.source);
    let records = JsonFileStore::for_target(&args.data_dir, source.kind(), source.target())
        .context("failed to open record store")?;
    info!(
        "Downloading {source} into {} ({} existing record(s), limit={}, max_pages={}, interval={interval}s)",
        records.path().display(),
        records.len(),
        args.limit,
        args.max_pages,
    );

    let mut bot =
        build_loop(store, Duration::from_secs(interval)).context("failed to initialise bot")?;
    cancel_on_ctrl_c(bot.cancellation_token());

    let mut job = DownloadJob::new(source, records)
        .with_limit(args.limit)
        .with_max_pages(args.max_pages);
    let summary = bot.run(&mut job).await;
    info!(
        "Exiting after {} cycle(s) ({} failed), {} record(s) stored",
        summary.cycles,
        summary.failed_cycles,
        job.store().len()
    );

    Ok(())
}
