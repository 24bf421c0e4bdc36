// src/upstream/twitter.rs
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{error_message, rate_limit_from_headers, record_outcome, Fetched, Upstream};
use crate::config::TwitterConfig;
use crate::error::UpstreamError;
use crate::model::{SearchQuery, Tweet};

const NAME: &str = "twitter";
const RECENT_SEARCH_PATH: &str = "/2/tweets/search/recent";
const TWEET_FIELDS: &str = "created_at,author_id";

pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";
pub const RESET_HEADER: &str = "x-rate-limit-reset";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    // absent when the search matched nothing
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Twitter API v2 recent-search adapter (bearer auth).
#[derive(Clone)]
pub struct TwitterClient {
    http: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl TwitterClient {
    pub fn new(http: Client, cfg: &TwitterConfig) -> Self {
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            bearer_token: cfg.bearer_token.clone().filter(|t| !t.trim().is_empty()),
        }
    }
}

#[async_trait]
impl Upstream for TwitterClient {
    type Record = Tweet;

    async fn fetch(&self, query: &SearchQuery) -> Result<Fetched<Tweet>, UpstreamError> {
        let Some(token) = self.bearer_token.as_deref() else {
            return Err(UpstreamError::NotConfigured {
                provider: NAME,
                setting: "TWITTER_BEARER_TOKEN",
            });
        };

        let t0 = Instant::now();
        let url = format!("{}{}", self.base_url, RECENT_SEARCH_PATH);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("query", query.keyword.clone()),
                ("max_results", query.count.to_string()),
                ("tweet.fields", TWEET_FIELDS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                record_outcome(NAME, "transport_error", t0);
                UpstreamError::Transport {
                    provider: NAME,
                    message: e.to_string(),
                }
            })?;

        let status = resp.status();
        let rate_limit = rate_limit_from_headers(resp.headers(), REMAINING_HEADER, RESET_HEADER);

        if status == StatusCode::TOO_MANY_REQUESTS {
            record_outcome(NAME, "throttled", t0);
            return Err(UpstreamError::Throttled {
                provider: NAME,
                rate_limit,
                retry_after_secs: None,
            });
        }

        let body = resp.text().await.map_err(|e| {
            record_outcome(NAME, "transport_error", t0);
            UpstreamError::Transport {
                provider: NAME,
                message: e.to_string(),
            }
        })?;

        if !status.is_success() {
            record_outcome(NAME, "http_error", t0);
            return Err(UpstreamError::Status {
                provider: NAME,
                status: status.as_u16(),
                message: error_message(&body, &["detail", "title", "message"]),
            });
        }

        let envelope: SearchEnvelope = serde_json::from_str(&body).map_err(|e| {
            record_outcome(NAME, "decode_error", t0);
            UpstreamError::Decode {
                provider: NAME,
                message: e.to_string(),
            }
        })?;

        let records: Vec<Tweet> = envelope
            .data
            .unwrap_or_default()
            .iter()
            .map(Tweet::from_value)
            .collect();

        record_outcome(NAME, "ok", t0);
        debug!(
            provider = NAME,
            keyword = %query.keyword,
            count = query.count,
            returned = records.len(),
            remaining = ?rate_limit.map(|s| s.remaining),
            "recent search done"
        );

        Ok(Fetched {
            records,
            rate_limit,
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
