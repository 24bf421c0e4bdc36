// src/upstream/mod.rs
pub mod news;
pub mod twitter;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::config::HttpConfig;
use crate::error::UpstreamError;
use crate::model::SearchQuery;
use crate::ratelimit::RateLimitStatus;

pub use news::NewsClient;
pub use twitter::TwitterClient;

/// One page of normalized records plus whatever quota info the provider sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<R> {
    pub records: Vec<R>,
    pub rate_limit: Option<RateLimitStatus>,
}

/// A single outbound search call against one provider.
#[async_trait]
pub trait Upstream: Send + Sync {
    type Record: Send;

    async fn fetch(&self, query: &SearchQuery) -> Result<Fetched<Self::Record>, UpstreamError>;
    fn name(&self) -> &'static str;
}

/// Shared reqwest client for provider adapters.
pub fn build_http_client(cfg: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("building upstream http client")
}

fn record_outcome(provider: &'static str, outcome: &'static str, started: Instant) {
    let ms = started.elapsed().as_secs_f64() * 1_000.0;
    histogram!("upstream_fetch_ms", "provider" => provider).record(ms);
    counter!("upstream_requests_total", "provider" => provider, "outcome" => outcome).increment(1);
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}

/// Read a remaining/reset header pair. Both must be present and numeric.
pub fn rate_limit_from_headers(
    headers: &HeaderMap,
    remaining_header: &str,
    reset_header: &str,
) -> Option<RateLimitStatus> {
    Some(RateLimitStatus {
        remaining: header_i64(headers, remaining_header)?,
        reset_epoch_seconds: header_i64(headers, reset_header)?,
    })
}

/// `Retry-After: <seconds>`, kept relative. HTTP-date values are ignored.
pub fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    let secs = header_i64(headers, RETRY_AFTER.as_str())?;
    Some(u64::try_from(secs).unwrap_or(0))
}

/// Best-effort error text from a JSON error body, falling back to the raw body.
fn error_message(body: &str, keys: &[&str]) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        for key in keys {
            if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
                if !s.trim().is_empty() {
                    return s.to_string();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(300).collect()
    }
}
