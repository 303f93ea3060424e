use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Successful answer to the password grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Reddit's `{"kind": "Listing", "data": {...}}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData<T> {
    pub children: Vec<T>,
}

/// A single listing child: `{"kind": "t1", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing<T = Value> {
    #[serde(default)]
    pub kind: String,
    pub data: T,
}

impl Thing<Value> {
    /// Fullname of the thing (`t1_...`, `t3_...`), if present.
    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }
}

/// The fields of an inbox message the bot looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnreadMessage {
    /// Fullname, used as the reply target and for mark-read.
    pub name: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Subset of `/api/v1/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub link_karma: Option<i64>,
    #[serde(default)]
    pub comment_karma: Option<i64>,
}

/// Pagination parameters accepted by the listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingParams {
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: u32,
}

/// Reddit's default and maximum page size.
pub const DEFAULT_LIMIT: u32 = 100;

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            before: None,
            after: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListingParams {
    pub fn after(after: Option<String>, limit: u32) -> Self {
        Self {
            before: None,
            after,
            limit,
        }
    }
}
