//! setup-account — First-time setup for the Reddit ticker bot.
//!
//! Expects `config.toml` to already exist with the `[auth]` client id, secret
//! and username filled in. Reads the account password, requests an access
//! token, prints the authenticated identity, and saves the password and the
//! fresh token into the existing config file.
//!
//! By default, reads the password interactively (hidden input) to avoid
//! leaking it into shell history. Use `--password` only for scripted/CI use.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use reddit_ticker_bot::api::RedditApi;
use reddit_ticker_bot::auth::TokenManager;
use reddit_ticker_bot::config::{CONFIG_PATH, FileConfigStore, MemoryConfigStore};
use reddit_ticker_bot::transport::ReqwestTransport;

#[derive(Parser)]
#[command(
    name = "setup-account",
    about = "Validate credentials, print account info, and save them to config.toml"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Reddit account password.
    /// If omitted, reads interactively with hidden input (recommended).
    #[arg(long)]
    password: Option<String>,
}

/// Trim surrounding whitespace and reject empty passwords, whichever way the
/// password was supplied.
fn clean_password(raw: &str) -> Result<String> {
    let password = raw.trim();
    if password.is_empty() {
        bail!("password cannot be empty");
    }
    Ok(password.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load existing config
    let mut store = FileConfigStore::open(&cli.config).with_context(|| {
        format!(
            "failed to open {} — it needs an [auth] section with client id, secret and username",
            cli.config.display()
        )
    })?;

    println!("=== Reddit Ticker Bot — Account Setup ===\n");

    // ── Step 1: Read password ──────────────────────────────────────
    let username = store.config().auth.username.clone();
    if username.is_empty() {
        bail!("auth.username is empty in {}", cli.config.display());
    }
    let password = match cli.password {
        Some(password) => password,
        None => rpassword::prompt_password(format!("Password for u/{username}: "))
            .context("failed to read password")?,
    };
    let password = clean_password(&password)?;

    // ── Step 2: Request an access token ────────────────────────────
    println!("Requesting access token from {}...", store.config().auth.auth_url);
    let mut config = store.config().clone();
    config.auth.password = password;
    let transport = ReqwestTransport::new(Duration::from_secs(config.default.timeout))?;
    let mut tokens = TokenManager::new(
        config.credentials(),
        config.user_agent(),
        MemoryConfigStore::default(),
    );
    let header = tokens
        .refresh(&transport)
        .await
        .context("authentication failed — check client id, secret, username and password")?;
    let token = tokens
        .token()
        .cloned()
        .context("token missing after successful grant")?;
    let expiry = chrono::DateTime::from_timestamp(token.expiry, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| token.expiry.to_string());
    println!("  Authentication successful (token expires {expiry})");
    println!();

    // ── Step 3: Verify identity ────────────────────────────────────
    println!("Fetching account info...");
    let api = RedditApi::new(transport, username.clone());
    let me = api
        .get_me(&header)
        .await
        .context("failed to fetch /api/v1/me")?;
    println!("  Username:      u/{}", me.name);
    if let Some(id) = &me.id {
        println!("  Account id:    t2_{id}");
    }
    if let Some(karma) = me.comment_karma {
        println!("  Comment karma: {karma}");
    }
    if let Some(karma) = me.link_karma {
        println!("  Link karma:    {karma}");
    }
    if !me.name.eq_ignore_ascii_case(&username) {
        println!("  WARNING: token belongs to u/{} but config says u/{username}", me.name);
    }
    println!();

    // ── Step 4: Save credentials and token ─────────────────────────
    println!("Updating {}...", cli.config.display());
    let saved = store.config_mut();
    saved.auth.password = config.auth.password;
    saved.access_token.access_token = Some(token.token);
    saved.access_token.access_token_expiry_time = Some(token.expiry);
    store.save()?;
    println!("  Config updated successfully");
    println!();

    println!("=== Setup Complete ===");
    println!();
    println!("Next steps:");
    println!("  cargo run --bin ticker-bot");
    println!("  cargo run --bin download-bot -- subreddit <name>");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_trimmed() {
        assert_eq!(clean_password("  hunter2\n").unwrap(), "hunter2");
        assert_eq!(clean_password("hunter2").unwrap(), "hunter2");
    }

    #[test]
    fn blank_password_is_rejected() {
        assert!(clean_password("").is_err());
        assert!(clean_password(" \t\n").is_err());
    }
}
