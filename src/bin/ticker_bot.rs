//! ticker-bot — answers `u/<bot> <TICKER>` mentions.
//!
//! Polls the inbox every `default.sleep_time` seconds, replies to well-formed
//! ticker requests and marks every fetched message as read.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use reddit_ticker_bot::config::{CONFIG_PATH, FileConfigStore};
use reddit_ticker_bot::jobs::MentionJob;
use reddit_ticker_bot::{build_loop, cancel_on_ctrl_c, logging};

#[derive(Parser)]
#[command(name = "ticker-bot", about = "Reddit bot replying to ticker mentions")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override the poll interval in seconds
    #[arg(long)]
    sleep_time: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let store = FileConfigStore::open(&args.config)?;
    let _log_guard = logging::init(&store.config().logging)?;
    info!("Loaded config from {}", args.config.display());

    let sleep_time = args.sleep_time.unwrap_or(store.config().default.sleep_time);
    info!(
        "Starting ticker bot as u/{} (poll={sleep_time}s)",
        store.config().auth.username
    );

    let mut bot = build_loop(store, Duration::from_secs(sleep_time))
        .context("failed to initialise bot")?;
    cancel_on_ctrl_c(bot.cancellation_token());

    let mut job = MentionJob::new();
    let summary = bot.run(&mut job).await;
    info!(
        "Exiting after {} cycle(s) ({} failed): {} replies sent, {} failed, {} messages read",
        summary.cycles,
        summary.failed_cycles,
        job.replies_sent,
        job.replies_failed,
        job.messages_read
    );

    Ok(())
}
