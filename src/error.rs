use thiserror::Error;

/// Errors surfaced by the bot library.
///
/// `Auth` and `Api` carry the raw status and body so the operator can see what
/// Reddit actually answered. `Validation` is only produced for individual
/// messages and is never propagated out of a batch.
#[derive(Debug, Error)]
pub enum BotError {
    /// The token grant was rejected.
    #[error("authentication failed (status {status}): {body}")]
    Auth { status: u16, body: String },

    /// Any non-2xx answer from an API endpoint.
    #[error("API request failed (status {status}): {body}")]
    Api { status: u16, body: String },

    /// A single message did not have the expected shape.
    #[error("invalid message: {0}")]
    Validation(String),

    /// A 2xx answer whose body could not be decoded.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;
