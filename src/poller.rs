use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::RedditApi;
use crate::auth::{RequestHeader, TokenManager};
use crate::config::ConfigStore;
use crate::error::{BotError, Result};
use crate::transport::HttpTransport;

/// What a unit of work asks the driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    /// Pause this long, on top of the regular interval, before the next cycle.
    CoolDown(Duration),
    /// Stop the loop after this cycle.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Counters returned once the loop has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
}

/// One unit of work run on every poll cycle.
#[allow(async_fn_in_trait)]
pub trait PollJob {
    /// Short label used in logs.
    fn name(&self) -> String;

    async fn run_cycle<T: HttpTransport>(
        &mut self,
        api: &RedditApi<T>,
        header: &RequestHeader,
    ) -> Result<CycleOutcome>;
}

/// Fixed-interval driver: sleep, ensure a valid token, run the job.
///
/// Errors from a cycle are logged and the loop carries on; only a `Stop`
/// outcome or the cancellation token ends it.
pub struct PollLoop<T, S> {
    api: RedditApi<T>,
    tokens: TokenManager<S>,
    interval: Duration,
    cancel: CancellationToken,
    state: LoopState,
}

impl<T: HttpTransport, S: ConfigStore> PollLoop<T, S> {
    pub fn new(api: RedditApi<T>, tokens: TokenManager<S>, interval: Duration) -> Self {
        Self {
            api,
            tokens,
            interval,
            cancel: CancellationToken::new(),
            state: LoopState::Running,
        }
    }

    /// Token that stops the loop at the next iteration boundary when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tokens(&self) -> &TokenManager<S> {
        &self.tokens
    }

    pub fn api(&self) -> &RedditApi<T> {
        &self.api
    }

    /// Run the job until it asks to stop or the loop is cancelled.
    pub async fn run<J: PollJob>(&mut self, job: &mut J) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let mut pause = Duration::ZERO;
        self.state = LoopState::Running;
        info!(
            "Entering polling loop for {} (interval: {}s)",
            job.name(),
            self.interval.as_secs()
        );

        while self.state == LoopState::Running {
            if self.cancel.is_cancelled() {
                self.state = LoopState::Stopped;
                break;
            }

            let wait = self.interval + pause;
            pause = Duration::ZERO;
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested");
                    self.state = LoopState::Stopped;
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            summary.cycles += 1;
            match self.run_once(job).await {
                Ok(CycleOutcome::Continue) => {}
                Ok(CycleOutcome::CoolDown(d)) => {
                    info!("Cooling down for {}s", d.as_secs());
                    pause = d;
                }
                Ok(CycleOutcome::Stop) => {
                    info!("{} finished, stopping", job.name());
                    self.state = LoopState::Stopped;
                }
                Err(e @ BotError::Api { status: 401, .. }) => {
                    summary.failed_cycles += 1;
                    warn!("Access token rejected, requesting a new one next cycle: {e}");
                    self.tokens.invalidate();
                }
                Err(e @ BotError::Auth { .. }) => {
                    summary.failed_cycles += 1;
                    warn!("Authentication failed, retrying next cycle: {e}");
                }
                Err(e) => {
                    summary.failed_cycles += 1;
                    warn!("Poll cycle error: {e}");
                }
            }

            if self.state == LoopState::Running && !self.tokens.is_token_valid() {
                info!("Access token expired, it will be refreshed before the next cycle");
            }
        }

        info!(
            cycles = summary.cycles,
            failed = summary.failed_cycles,
            "Polling loop stopped"
        );
        summary
    }

    /// A single cycle without the leading sleep.
    pub async fn run_once<J: PollJob>(&mut self, job: &mut J) -> Result<CycleOutcome> {
        let header = self.tokens.ensure_valid(self.api.transport()).await?;
        job.run_cycle(&self.api, &header).await
    }
}
