// src/upstream/news.rs
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{error_message, record_outcome, retry_after_secs, Fetched, Upstream};
use crate::config::NewsConfig;
use crate::error::UpstreamError;
use crate::model::{NewsArticle, SearchQuery};

const NAME: &str = "newsapi";
const EVERYTHING_PATH: &str = "/v2/everything";
const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Deserialize)]
struct EverythingEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Option<Vec<Value>>,
}

/// NewsAPI `/v2/everything` adapter (API-key auth).
#[derive(Clone)]
pub struct NewsClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsClient {
    pub fn new(http: Client, cfg: &NewsConfig) -> Self {
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl Upstream for NewsClient {
    type Record = NewsArticle;

    async fn fetch(&self, query: &SearchQuery) -> Result<Fetched<NewsArticle>, UpstreamError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(UpstreamError::NotConfigured {
                provider: NAME,
                setting: "NEWS_API_KEY",
            });
        };

        let t0 = Instant::now();
        let url = format!("{}{}", self.base_url, EVERYTHING_PATH);
        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, key)
            .query(&[
                ("q", query.keyword.clone()),
                ("pageSize", query.count.to_string()),
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
        if status == StatusCode::TOO_MANY_REQUESTS {
            record_outcome(NAME, "throttled", t0);
            return Err(UpstreamError::Throttled {
                provider: NAME,
                rate_limit: None,
                retry_after_secs: retry_after_secs(resp.headers()),
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
                message: error_message(&body, &["message", "code"]),
            });
        }

        let envelope: EverythingEnvelope = serde_json::from_str(&body).map_err(|e| {
            record_outcome(NAME, "decode_error", t0);
            UpstreamError::Decode {
                provider: NAME,
                message: e.to_string(),
            }
        })?;

        if envelope.status.as_deref() == Some("error") {
            record_outcome(NAME, "http_error", t0);
            return Err(UpstreamError::Status {
                provider: NAME,
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "unknown NewsAPI error".to_string()),
            });
        }

        let records: Vec<NewsArticle> = envelope
            .articles
            .unwrap_or_default()
            .iter()
            .map(NewsArticle::from_value)
            .collect();

        record_outcome(NAME, "ok", t0);
        debug!(
            provider = NAME,
            keyword = %query.keyword,
            count = query.count,
            returned = records.len(),
            "everything search done"
        );

        // NewsAPI doesn't publish quota headers on success.
        Ok(Fetched {
            records,
            rate_limit: None,
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
