use chrono::Utc;
use tracing::{info, warn};

use crate::api::RedditApi;
use crate::auth::RequestHeader;
use crate::error::Result;
use crate::poller::{CycleOutcome, PollJob};
use crate::processor::process_batch;
use crate::transport::HttpTransport;

/// Replies to `u/<bot> <TICKER>` mentions and marks the inbox read.
///
/// Replies are attempted one by one; a failed reply does not stop the others.
/// All ids of the batch are marked read in a single call once every reply has
/// been attempted. The first reply error is returned after mark-read.
#[derive(Debug, Default)]
pub struct MentionJob {
    pub replies_sent: u64,
    pub replies_failed: u64,
    pub messages_read: u64,
}

impl MentionJob {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PollJob for MentionJob {
    fn name(&self) -> String {
        "mention bot".to_string()
    }

    async fn run_cycle<T: HttpTransport>(
        &mut self,
        api: &RedditApi<T>,
        header: &RequestHeader,
    ) -> Result<CycleOutcome> {
        let unread = api.get_unread_messages(header).await?;
        if unread.is_empty() {
            return Ok(CycleOutcome::Continue);
        }

        let batch = process_batch(&unread, Utc::now());
        info!(
            "Fetched {} unread message(s), {} ticker request(s)",
            unread.len(),
            batch.replies.len()
        );

        let mut first_error = None;
        for reply in &batch.replies {
            match api.post_reply(header, &reply.thing_id, &reply.text).await {
                Ok(_) => {
                    info!("Replied to {} with data for {}", reply.thing_id, reply.ticker);
                    self.replies_sent += 1;
                }
                Err(e) => {
                    warn!("Failed to reply to {}: {e}", reply.thing_id);
                    self.replies_failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if !batch.read_ids.is_empty() {
            api.mark_read(header, &batch.read_ids).await?;
            self.messages_read += batch.read_ids.len() as u64;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(CycleOutcome::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::transport::{HttpResponse, MockHttpTransport};
    use serde_json::json;

    fn header() -> RequestHeader {
        RequestHeader {
            user_agent: "ua".into(),
            authorization: "bearer tok".into(),
        }
    }

    fn unread(messages: serde_json::Value) -> HttpResponse {
        let children: Vec<serde_json::Value> = messages
            .as_array()
            .unwrap()
            .iter()
            .map(|m| json!({"kind": "t1", "data": m}))
            .collect();
        HttpResponse::new(
            200,
            json!({"kind": "Listing", "data": {"children": children}}).to_string(),
        )
    }

    fn expect_unread(transport: &mut MockHttpTransport, messages: serde_json::Value) {
        let resp = unread(messages);
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/message/unread"))
            .times(1)
            .returning(move |_| Ok(resp.clone()));
    }

    #[tokio::test]
    async fn replies_to_mention_and_marks_whole_batch_read() {
        let mut transport = MockHttpTransport::new();
        expect_unread(
            &mut transport,
            json!([
                {"name": "t1_a", "type": "username_mention", "body": "u/bot AAPL"},
                {"name": "t1_b", "type": "comment_reply", "body": "irrelevant"}
            ]),
        );
        transport
            .expect_send()
            .withf(|req| {
                req.url.ends_with("/api/comment")
                    && req.query_value("thing_id") == Some("t1_a")
                    && req.query_value("text").is_some_and(|t| t.contains("AAPL"))
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));
        transport
            .expect_send()
            .withf(|req| {
                req.url.ends_with("/api/read_message") && req.form_value("id") == Some("t1_a,t1_b")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let api = RedditApi::new(transport, "bot");
        let mut job = MentionJob::new();
        let outcome = job.run_cycle(&api, &header()).await.unwrap();

        assert_eq!(outcome, CycleOutcome::Continue);
        assert_eq!(job.replies_sent, 1);
        assert_eq!(job.messages_read, 2);
    }

    #[tokio::test]
    async fn lowercase_ticker_gets_no_reply_but_is_marked_read() {
        let mut transport = MockHttpTransport::new();
        expect_unread(
            &mut transport,
            json!([{"name": "t1_a", "type": "username_mention", "body": "u/bot aapl"}]),
        );
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/api/comment"))
            .never();
        transport
            .expect_send()
            .withf(|req| {
                req.url.ends_with("/api/read_message")
                    && req.form_value("id") == Some("t1_a")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let api = RedditApi::new(transport, "bot");
        let mut job = MentionJob::new();
        job.run_cycle(&api, &header()).await.unwrap();

        assert_eq!(job.replies_sent, 0);
        assert_eq!(job.messages_read, 1);
    }

    #[tokio::test]
    async fn empty_inbox_makes_no_further_calls() {
        let mut transport = MockHttpTransport::new();
        expect_unread(&mut transport, json!([]));

        let api = RedditApi::new(transport, "bot");
        let mut job = MentionJob::new();
        let outcome = job.run_cycle(&api, &header()).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Continue);
    }

    #[tokio::test]
    async fn failed_reply_still_tries_peers_and_marks_read() {
        let mut transport = MockHttpTransport::new();
        expect_unread(
            &mut transport,
            json!([
                {"name": "t1_a", "type": "username_mention", "body": "u/bot AAPL"},
                {"name": "t1_b", "type": "username_mention", "body": "u/bot MSFT"}
            ]),
        );
        transport
            .expect_send()
            .withf(|req| {
                req.url.ends_with("/api/comment")
                    && req.query_value("thing_id") == Some("t1_a")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(500, "boom")));
        transport
            .expect_send()
            .withf(|req| {
                req.url.ends_with("/api/comment")
                    && req.query_value("thing_id") == Some("t1_b")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));
        transport
            .expect_send()
            .withf(|req| {
                req.url.ends_with("/api/read_message")
                    && req.form_value("id") == Some("t1_a,t1_b")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let api = RedditApi::new(transport, "bot");
        let mut job = MentionJob::new();
        let err = job.run_cycle(&api, &header()).await.unwrap_err();

        assert!(matches!(err, BotError::Api { status: 500, .. }));
        assert_eq!(job.replies_sent, 1);
        assert_eq!(job.replies_failed, 1);
        assert_eq!(job.messages_read, 2);
    }

    #[tokio::test]
    async fn mark_read_failure_propagates() {
        let mut transport = MockHttpTransport::new();
        expect_unread(
            &mut transport,
            json!([{"name": "t4_x", "type": "unknown", "body": "hello"}]),
        );
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/api/read_message"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(429, "slow down")));

        let api = RedditApi::new(transport, "bot");
        let mut job = MentionJob::new();
        let err = job.run_cycle(&api, &header()).await.unwrap_err();
        assert!(matches!(err, BotError::Api { status: 429, .. }));
    }
}
