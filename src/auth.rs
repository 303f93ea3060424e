use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::error::{BotError, Result};
use crate::transport::{HttpRequest, HttpTransport};
use crate::types::TokenGrant;

/// Script-app credentials for the OAuth2 password grant.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub auth_url: String,
}

/// Bearer token with its absolute expiry in epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expiry: i64,
}

/// Headers sent with every API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub user_agent: String,
    pub authorization: String,
}

impl RequestHeader {
    pub fn new(user_agent: &str, token: &AccessToken) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            authorization: format!("bearer {}", token.token),
        }
    }

    /// Attach both headers to a request.
    pub fn apply(&self, request: HttpRequest) -> HttpRequest {
        request
            .header("User-Agent", self.user_agent.clone())
            .header("Authorization", self.authorization.clone())
    }
}

/// A token is usable only while `now < expiry`. A missing expiry is never valid.
pub fn is_valid(expiry: Option<i64>, now: i64) -> bool {
    matches!(expiry, Some(expiry) if expiry > now)
}

/// Current time in epoch seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Owns the access token: acquisition, validity check and refresh.
///
/// Every new token is flushed to the `ConfigStore` before it is handed out,
/// so a restarted process picks it up instead of requesting another grant.
pub struct TokenManager<S> {
    credentials: Credentials,
    user_agent: String,
    token: Option<AccessToken>,
    header: Option<RequestHeader>,
    store: S,
}

impl<S: ConfigStore> TokenManager<S> {
    pub fn new(credentials: Credentials, user_agent: impl Into<String>, store: S) -> Self {
        let user_agent = user_agent.into();
        let token = store.cached_token();
        let header = token.as_ref().map(|t| RequestHeader::new(&user_agent, t));
        Self {
            credentials,
            user_agent,
            token,
            header,
            store,
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Header for the current token, without touching the network.
    pub fn header(&self) -> Option<&RequestHeader> {
        self.header.as_ref()
    }

    pub fn is_token_valid(&self) -> bool {
        self.is_token_valid_at(now_epoch())
    }

    pub fn is_token_valid_at(&self, now: i64) -> bool {
        is_valid(self.token.as_ref().map(|t| t.expiry), now)
    }

    /// Forget the current token so the next `ensure_valid` requests a new
    /// grant. Used when the API rejects a token before its expiry.
    pub fn invalidate(&mut self) {
        self.token = None;
        self.header = None;
    }

    /// Return a header for a valid token, requesting a new grant if needed.
    pub async fn ensure_valid<T: HttpTransport + ?Sized>(
        &mut self,
        transport: &T,
    ) -> Result<RequestHeader> {
        self.ensure_valid_at(transport, now_epoch()).await
    }

    pub async fn ensure_valid_at<T: HttpTransport + ?Sized>(
        &mut self,
        transport: &T,
        now: i64,
    ) -> Result<RequestHeader> {
        if self.is_token_valid_at(now) {
            if let Some(header) = &self.header {
                return Ok(header.clone());
            }
        }
        debug!("Access token missing or expired, requesting a new one");
        self.refresh_at(transport, now).await
    }

    /// Request a new grant regardless of the cached token.
    pub async fn refresh<T: HttpTransport + ?Sized>(
        &mut self,
        transport: &T,
    ) -> Result<RequestHeader> {
        self.refresh_at(transport, now_epoch()).await
    }

    async fn refresh_at<T: HttpTransport + ?Sized>(
        &mut self,
        transport: &T,
        now: i64,
    ) -> Result<RequestHeader> {
        let grant = request_grant(transport, &self.credentials, &self.user_agent).await?;
        let token = AccessToken {
            token: grant.access_token,
            expiry: now.saturating_add(grant.expires_in),
        };
        self.store.persist_token(&token)?;

        let header = RequestHeader::new(&self.user_agent, &token);
        info!(
            expiry = token.expiry,
            scope = grant.scope.as_deref().unwrap_or("-"),
            "Acquired new access token"
        );
        self.token = Some(token);
        self.header = Some(header.clone());
        Ok(header)
    }
}

/// Perform the OAuth2 password grant against `credentials.auth_url`.
pub async fn request_grant<T: HttpTransport + ?Sized>(
    transport: &T,
    credentials: &Credentials,
    user_agent: &str,
) -> Result<TokenGrant> {
    let request = HttpRequest::post(&credentials.auth_url)
        .header("User-Agent", user_agent)
        .basic_auth(&credentials.client_id, &credentials.client_secret)
        .form("grant_type", "password")
        .form("username", &credentials.username)
        .form("password", &credentials.password);

    let resp = transport.send(request).await?;
    if !resp.is_success() {
        return Err(BotError::Auth {
            status: resp.status,
            body: resp.body,
        });
    }

    // Reddit answers bad credentials with 200 and an `error` field.
    let value: serde_json::Value = resp.json()?;
    if let Some(error) = value.get("error") {
        return Err(BotError::Auth {
            status: resp.status,
            body: error.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|e| BotError::UnexpectedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::transport::{HttpResponse, MockHttpTransport};

    const NOW: i64 = 1_700_000_000;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            username: "tickerbot".into(),
            password: "hunter2".into(),
            auth_url: "https://www.reddit.com/api/v1/access_token".into(),
        }
    }

    fn grant_ok() -> HttpResponse {
        HttpResponse::new(
            200,
            r#"{"access_token":"tok-1","token_type":"bearer","expires_in":3600,"scope":"*"}"#,
        )
    }

    #[test]
    fn validity_is_strict() {
        assert!(is_valid(Some(NOW + 1), NOW));
        assert!(!is_valid(Some(NOW), NOW));
        assert!(!is_valid(Some(NOW - 60), NOW));
        assert!(!is_valid(None, NOW));
    }

    #[test]
    fn header_uses_lowercase_bearer() {
        let token = AccessToken {
            token: "abc".into(),
            expiry: NOW,
        };
        let header = RequestHeader::new("bot/1.0 by me", &token);
        assert_eq!(header.authorization, "bearer abc");
        assert_eq!(header.user_agent, "bot/1.0 by me");
    }

    #[tokio::test]
    async fn acquires_token_when_none_cached() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.url == "https://www.reddit.com/api/v1/access_token"
                    && req.basic_auth == Some(("cid".into(), "secret".into()))
                    && req.form_value("grant_type") == Some("password")
                    && req.form_value("username") == Some("tickerbot")
                    && req.form_value("password") == Some("hunter2")
                    && req.header_value("User-Agent") == Some("bot/1.0 by tickerbot")
            })
            .times(1)
            .returning(|_| Ok(grant_ok()));

        let mut manager =
            TokenManager::new(credentials(), "bot/1.0 by tickerbot", MemoryConfigStore::default());
        let header = manager.ensure_valid_at(&transport, NOW).await.unwrap();

        assert_eq!(header.authorization, "bearer tok-1");
        assert_eq!(manager.token().unwrap().expiry, NOW + 3600);
        assert_eq!(manager.store().persist_count, 1);
        assert_eq!(manager.store().token.as_ref().unwrap().token, "tok-1");
    }

    #[tokio::test]
    async fn second_call_with_valid_token_makes_no_request() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(grant_ok()));

        let mut manager = TokenManager::new(credentials(), "ua", MemoryConfigStore::default());
        let first = manager.ensure_valid_at(&transport, NOW).await.unwrap();
        let second = manager.ensure_valid_at(&transport, NOW + 10).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.store().persist_count, 1);
    }

    #[tokio::test]
    async fn cached_valid_token_is_reused_from_store() {
        let transport = MockHttpTransport::new();
        let store = MemoryConfigStore {
            token: Some(AccessToken {
                token: "cached".into(),
                expiry: NOW + 100,
            }),
            persist_count: 0,
        };

        let mut manager = TokenManager::new(credentials(), "ua", store);
        let header = manager.ensure_valid_at(&transport, NOW).await.unwrap();
        assert_eq!(header.authorization, "bearer cached");
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(grant_ok()));
        let store = MemoryConfigStore {
            token: Some(AccessToken {
                token: "stale".into(),
                expiry: NOW,
            }),
            persist_count: 0,
        };

        let mut manager = TokenManager::new(credentials(), "ua", store);
        assert_eq!(manager.header().unwrap().authorization, "bearer stale");

        let header = manager.ensure_valid_at(&transport, NOW).await.unwrap();
        assert_eq!(header.authorization, "bearer tok-1");
        assert_eq!(manager.header().unwrap(), &header);
        assert_eq!(manager.store().token.as_ref().unwrap().expiry, NOW + 3600);
    }

    #[tokio::test]
    async fn invalidated_token_is_replaced_before_expiry() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(grant_ok()));
        let store = MemoryConfigStore {
            token: Some(AccessToken {
                token: "revoked".into(),
                expiry: NOW + 3000,
            }),
            persist_count: 0,
        };

        let mut manager = TokenManager::new(credentials(), "ua", store);
        manager.invalidate();
        assert!(manager.header().is_none());
        assert!(!manager.is_token_valid_at(NOW));

        let header = manager.ensure_valid_at(&transport, NOW).await.unwrap();
        assert_eq!(header.authorization, "bearer tok-1");
        assert_eq!(manager.store().persist_count, 1);
    }

    #[tokio::test]
    async fn huge_expires_in_saturates() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(HttpResponse::new(
                200,
                format!(r#"{{"access_token":"tok","expires_in":{}}}"#, i64::MAX),
            ))
        });

        let mut manager = TokenManager::new(credentials(), "ua", MemoryConfigStore::default());
        manager.ensure_valid_at(&transport, NOW).await.unwrap();
        assert_eq!(manager.token().unwrap().expiry, i64::MAX);
    }

    #[tokio::test]
    async fn rejected_grant_is_auth_error() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, r#"{"message":"Unauthorized"}"#)));

        let mut manager = TokenManager::new(credentials(), "ua", MemoryConfigStore::default());
        let err = manager.ensure_valid_at(&transport, NOW).await.unwrap_err();

        assert!(matches!(err, BotError::Auth { status: 401, .. }));
        assert!(manager.token().is_none());
        assert_eq!(manager.store().persist_count, 0);
    }

    #[tokio::test]
    async fn error_field_in_ok_body_is_auth_error() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(HttpResponse::new(200, r#"{"error":"invalid_grant"}"#)));

        let mut manager = TokenManager::new(credentials(), "ua", MemoryConfigStore::default());
        let err = manager.ensure_valid_at(&transport, NOW).await.unwrap_err();
        assert!(matches!(err, BotError::Auth { status: 200, .. }));
    }
}
