use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::auth::RequestHeader;
use crate::error::{BotError, Result};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::{Identity, Listing, ListingParams, Thing};

/// Reddit's OAuth API host.
pub const API_BASE: &str = "https://oauth.reddit.com";

/// Thin request-building layer over the transport.
///
/// Every method takes the current `RequestHeader`; callers obtain it from the
/// token manager right before the call.
pub struct RedditApi<T> {
    transport: T,
    base_url: String,
    username: String,
}

impl<T: HttpTransport> RedditApi<T> {
    /// `username` is the authenticated account, used when a user listing is
    /// requested without an explicit user.
    pub fn new(transport: T, username: impl Into<String>) -> Self {
        Self::with_base_url(transport, username, API_BASE)
    }

    pub fn with_base_url(
        transport: T,
        username: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, header: &RequestHeader, request: HttpRequest) -> Result<HttpResponse> {
        let request = header.apply(request);
        let method = request.method.clone();
        let url = request.url.clone();
        let resp = self.transport.send(request).await?;
        debug!(
            %method,
            url = %url,
            status = resp.status,
            response_length = resp.body.len(),
            "API request"
        );
        if !resp.is_success() {
            return Err(BotError::Api {
                status: resp.status,
                body: resp.body,
            });
        }
        Ok(resp)
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        header: &RequestHeader,
        request: HttpRequest,
    ) -> Result<R> {
        self.send(header, request).await?.json()
    }

    async fn get_listing(
        &self,
        header: &RequestHeader,
        path: &str,
        params: &ListingParams,
    ) -> Result<Vec<Thing>> {
        let request = with_listing_params(HttpRequest::get(self.url(path)), params);
        let listing: Listing<Thing> = self.get_json(header, request).await?;
        Ok(listing.data.children)
    }

    /// `GET /api/v1/me`
    pub async fn get_me(&self, header: &RequestHeader) -> Result<Identity> {
        self.get_json(header, HttpRequest::get(self.url("/api/v1/me")))
            .await
    }

    /// `GET /message/unread`
    ///
    /// Children are returned undecoded so that one malformed message does not
    /// fail the whole batch.
    pub async fn get_unread_messages(&self, header: &RequestHeader) -> Result<Vec<Thing>> {
        let request = HttpRequest::get(self.url("/message/unread"));
        let listing: Listing<Thing> = self.get_json(header, request).await?;
        Ok(listing.data.children)
    }

    /// `POST /api/comment?thing_id=&text=`
    pub async fn post_reply(
        &self,
        header: &RequestHeader,
        thing_id: &str,
        text: &str,
    ) -> Result<Value> {
        let request = HttpRequest::post(self.url("/api/comment"))
            .query("thing_id", thing_id)
            .query("text", text);
        let resp = self.send(header, request).await?;
        if resp.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        resp.json()
    }

    /// `POST /api/read_message` with form body `id=<comma-separated ids>`.
    pub async fn mark_read(&self, header: &RequestHeader, ids: &[String]) -> Result<()> {
        let request = HttpRequest::post(self.url("/api/read_message")).form("id", ids.join(","));
        self.send(header, request).await?;
        Ok(())
    }

    /// `GET /r/{subreddit}/new`
    pub async fn get_recent_submissions(
        &self,
        header: &RequestHeader,
        subreddit: &str,
        params: &ListingParams,
    ) -> Result<Vec<Thing>> {
        self.get_listing(header, &format!("/r/{subreddit}/new"), params)
            .await
    }

    /// `GET /user/{username}/comments`; defaults to the authenticated account.
    pub async fn get_user_comments(
        &self,
        header: &RequestHeader,
        username: Option<&str>,
        params: &ListingParams,
    ) -> Result<Vec<Thing>> {
        let user = username.unwrap_or(&self.username);
        self.get_listing(header, &format!("/user/{user}/comments"), params)
            .await
    }

    /// `GET /user/{username}/submitted`; defaults to the authenticated account.
    pub async fn get_user_submissions(
        &self,
        header: &RequestHeader,
        username: Option<&str>,
        params: &ListingParams,
    ) -> Result<Vec<Thing>> {
        let user = username.unwrap_or(&self.username);
        self.get_listing(header, &format!("/user/{user}/submitted"), params)
            .await
    }
}

fn with_listing_params(mut request: HttpRequest, params: &ListingParams) -> HttpRequest {
    if let Some(before) = &params.before {
        request = request.query("before", before.clone());
    }
    if let Some(after) = &params.after {
        request = request.query("after", after.clone());
    }
    request.query("limit", params.limit.to_string())
}
