use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::RedditApi;
use crate::auth::RequestHeader;
use crate::error::Result;
use crate::poller::{CycleOutcome, PollJob};
use crate::store::RecordStore;
use crate::transport::HttpTransport;
use crate::types::{DEFAULT_LIMIT, ListingParams, Thing};

/// Pause after a full pass over the listing, before starting again from the
/// newest item.
pub const COOL_DOWN: Duration = Duration::from_secs(60);

/// Default number of pages walked before the cursor is reset.
pub const DEFAULT_MAX_PAGES: u32 = 2;

/// Which listing a download job walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSource {
    /// `/r/{subreddit}/new`
    Subreddit(String),
    /// `/user/{username}/comments`
    UserComments(String),
    /// `/user/{username}/submitted`
    UserSubmissions(String),
}

impl ListingSource {
    /// Record kind, used to name the store file.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Subreddit(_) | Self::UserSubmissions(_) => "submissions",
            Self::UserComments(_) => "comments",
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Subreddit(name) | Self::UserComments(name) | Self::UserSubmissions(name) => name,
        }
    }

    /// User histories end; a subreddit's new feed does not.
    fn is_finite(&self) -> bool {
        !matches!(self, Self::Subreddit(_))
    }
}

impl fmt::Display for ListingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subreddit(name) => write!(f, "r/{name} new submissions"),
            Self::UserComments(name) => write!(f, "u/{name} comments"),
            Self::UserSubmissions(name) => write!(f, "u/{name} submissions"),
        }
    }
}

/// Walks a listing page by page and upserts every item into a record store,
/// keyed by its fullname.
///
/// The `after` cursor moves backwards in time. For a subreddit feed, once
/// `max_pages * limit` results have been collected the cursor is reset to the
/// newest item and the job asks for a cool-down. User histories are followed
/// until an empty page and then the job stops.
pub struct DownloadJob<R> {
    source: ListingSource,
    store: R,
    limit: u32,
    max_pages: u32,
    cursor: Option<String>,
    num_results: u64,
}

impl<R: RecordStore> DownloadJob<R> {
    pub fn new(source: ListingSource, store: R) -> Self {
        Self {
            source,
            store,
            limit: DEFAULT_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
            cursor: None,
            num_results: 0,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn num_results(&self) -> u64 {
        self.num_results
    }

    pub fn max_results(&self) -> u64 {
        u64::from(self.max_pages) * u64::from(self.limit)
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    fn reset_cursor(&mut self) {
        self.cursor = None;
        self.num_results = 0;
    }

    async fn fetch_page<T: HttpTransport>(
        &self,
        api: &RedditApi<T>,
        header: &RequestHeader,
    ) -> Result<Vec<Thing>> {
        let params = ListingParams::after(self.cursor.clone(), self.limit);
        match &self.source {
            ListingSource::Subreddit(name) => {
                api.get_recent_submissions(header, name, &params).await
            }
            ListingSource::UserComments(name) => {
                api.get_user_comments(header, Some(name.as_str()), &params).await
            }
            ListingSource::UserSubmissions(name) => {
                api.get_user_submissions(header, Some(name.as_str()), &params).await
            }
        }
    }

    fn store_page(&mut self, page: Vec<Thing>) -> Result<Option<String>> {
        let mut last_name = None;
        for thing in page {
            let Some(name) = thing.name().map(str::to_string) else {
                warn!("Skipping {} item without a name", self.source);
                continue;
            };
            self.store.upsert(&name, thing.data)?;
            last_name = Some(name);
        }
        self.store.flush()?;
        Ok(last_name)
    }
}

impl<R: RecordStore> PollJob for DownloadJob<R> {
    fn name(&self) -> String {
        format!("{} download", self.source)
    }

    async fn run_cycle<T: HttpTransport>(
        &mut self,
        api: &RedditApi<T>,
        header: &RequestHeader,
    ) -> Result<CycleOutcome> {
        let page = self.fetch_page(api, header).await?;

        if page.is_empty() {
            if self.source.is_finite() {
                info!("No more {} to download", self.source);
                return Ok(CycleOutcome::Stop);
            }
            debug!("Reached the end of {}, starting over", self.source);
            self.reset_cursor();
            return Ok(CycleOutcome::CoolDown(COOL_DOWN));
        }

        let count = page.len() as u64;
        if let Some(last) = self.store_page(page)? {
            self.cursor = Some(last);
        }
        self.num_results += count;
        info!(
            "Stored {count} {} (total this pass: {}, store size: {})",
            self.source,
            self.num_results,
            self.store.len()
        );

        // User histories are walked to the end; only the endless subreddit
        // feed restarts from the newest item.
        if !self.source.is_finite() && self.num_results >= self.max_results() {
            self.reset_cursor();
            return Ok(CycleOutcome::CoolDown(COOL_DOWN));
        }
        Ok(CycleOutcome::Continue)
    }
}
