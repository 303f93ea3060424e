use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::BotError;
use crate::types::{Thing, UnreadMessage};

/// Message type Reddit assigns to `u/<name>` mentions.
pub const MENTION_TYPE: &str = "username_mention";

/// A reply to post for one matched mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub thing_id: String,
    pub ticker: String,
    pub text: String,
}

/// Result of scanning one unread batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedBatch {
    pub replies: Vec<Reply>,
    /// Every id seen in the batch, in listing order, matched or not.
    pub read_ids: Vec<String>,
    /// Children that could not be decoded into a message.
    pub skipped: usize,
}

/// A ticker is one or more characters, every one of them `A`-`Z`.
pub fn is_valid_ticker(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_uppercase())
}

/// Extract the ticker from a `"<mention> <TICKER>"` message, if it is one.
pub fn parse_mention(message: &UnreadMessage) -> Option<&str> {
    if message.kind != MENTION_TYPE {
        return None;
    }
    let mut fields = message.body.split_whitespace();
    let (Some(_mention), Some(ticker), None) = (fields.next(), fields.next(), fields.next()) else {
        return None;
    };
    is_valid_ticker(ticker).then_some(ticker)
}

/// Reply text for a ticker request.
pub fn render_reply(ticker: &str, now: DateTime<Utc>) -> String {
    format!(
        "Hello! Here is your requested data for {ticker}:\n\
         \n\
         - Test item 1\n\
         - Test item 2\n\
         \n\
         Response time: {}",
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

fn decode(thing: &Thing) -> Result<UnreadMessage, BotError> {
    serde_json::from_value(thing.data.clone())
        .map_err(|e| BotError::Validation(format!("{} ({e})", thing.name().unwrap_or("<no name>"))))
}

/// Filter one unread batch into replies and the ids to acknowledge.
pub fn process_batch(batch: &[Thing], now: DateTime<Utc>) -> ProcessedBatch {
    let mut out = ProcessedBatch::default();

    for thing in batch {
        let message = match decode(thing) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping message: {e}");
                if let Some(name) = thing.name() {
                    out.read_ids.push(name.to_string());
                }
                out.skipped += 1;
                continue;
            }
        };
        out.read_ids.push(message.name.clone());

        match parse_mention(&message) {
            Some(ticker) => {
                debug!(id = %message.name, ticker, "Matched ticker request");
                out.replies.push(Reply {
                    thing_id: message.name.clone(),
                    ticker: ticker.to_string(),
                    text: render_reply(ticker, now),
                });
            }
            None => debug!(id = %message.name, kind = %message.kind, "Ignoring message"),
        }
    }

    out
}
