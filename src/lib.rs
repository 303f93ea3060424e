pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod poller;
pub mod processor;
pub mod store;
pub mod transport;
pub mod types;

pub use error::{BotError, Result};

use std::time::Duration;

use config::FileConfigStore;
use transport::ReqwestTransport;

/// A loop wired with the real transport and the config file as token store.
pub type BotLoop = poller::PollLoop<ReqwestTransport, FileConfigStore>;

/// Wire the token manager, API gateway and poll loop from a loaded config.
///
/// No network traffic happens here; the first token is requested by the loop
/// on its first cycle if the cached one is missing or expired.
pub fn build_loop(store: FileConfigStore, interval: Duration) -> Result<BotLoop> {
    let config = store.config();
    let transport = ReqwestTransport::new(Duration::from_secs(config.default.timeout))?;
    let api = api::RedditApi::new(transport, config.auth.username.clone());
    let credentials = config.credentials();
    let user_agent = config.user_agent();
    let tokens = auth::TokenManager::new(credentials, user_agent, store);
    Ok(poller::PollLoop::new(api, tokens, interval))
}

/// Cancel `token` when Ctrl+C is received.
pub fn cancel_on_ctrl_c(token: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            token.cancel();
        }
    });
}
