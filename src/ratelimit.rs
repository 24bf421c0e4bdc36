// src/ratelimit.rs
//! Rate-limit guard around a single upstream fetch.
//!
//! Two triggers are recognised:
//! - *exhausted*: a successful response whose headers report zero remaining quota;
//! - *throttled*: the provider rejected the call with HTTP 429.
//!
//! Each trigger has its own [`RateLimitPolicy`]. Block-and-retry sleeps on the
//! request's own task (never under a shared lock) and re-issues the call, but only
//! when the quota resets within `max_block_secs`; fail-fast hands `wait_time` back
//! to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ApiError, UpstreamError};
use crate::model::SearchQuery;
use crate::upstream::Upstream;

/// Quota snapshot taken from upstream headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub remaining: i64,
    pub reset_epoch_seconds: i64,
}

impl RateLimitStatus {
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0
    }
}

/// Seconds until `reset_epoch_seconds`, never negative.
pub fn wait_time_at(status: &RateLimitStatus, now_epoch_secs: i64) -> u64 {
    let delta = status.reset_epoch_seconds.saturating_sub(now_epoch_secs);
    u64::try_from(delta).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    BlockAndRetry,
    FailFast,
}

fn default_on_exhausted() -> RateLimitPolicy {
    RateLimitPolicy::BlockAndRetry
}
fn default_on_throttled() -> RateLimitPolicy {
    RateLimitPolicy::FailFast
}
fn default_max_retries() -> u32 {
    1
}
fn default_max_block_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_on_exhausted")]
    pub on_exhausted: RateLimitPolicy,
    #[serde(default = "default_on_throttled")]
    pub on_throttled: RateLimitPolicy,
    /// Retries allowed under block-and-retry.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Longest wait worth blocking for; a longer wait skips the retry.
    #[serde(default = "default_max_block_secs")]
    pub max_block_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            on_exhausted: default_on_exhausted(),
            on_throttled: default_on_throttled(),
            max_retries: default_max_retries(),
            max_block_secs: default_max_block_secs(),
        }
    }
}

/// Wall clock + sleeper, injectable so tests can observe sleeps without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
    async fn sleep(&self, d: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

#[derive(Clone)]
pub struct RateLimitGuard {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimitGuard {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn wait_time(&self, status: &RateLimitStatus) -> u64 {
        wait_time_at(status, self.clock.now_epoch_secs())
    }

    /// Seconds to wait before a throttled call may be retried.
    /// An absolute reset wins over a relative `Retry-After`; neither means 0.
    pub fn throttled_wait_time(
        &self,
        rate_limit: Option<&RateLimitStatus>,
        retry_after_secs: Option<u64>,
    ) -> u64 {
        match (rate_limit, retry_after_secs) {
            (Some(status), _) => self.wait_time(status),
            (None, Some(secs)) => secs,
            (None, None) => 0,
        }
    }

    /// A capped sleep shorter than the quota window cannot make a retry succeed.
    fn can_block(&self, retries: u32, wait_time: u64) -> bool {
        retries < self.config.max_retries && wait_time <= self.config.max_block_secs
    }

    /// Run one guarded fetch and resolve it into records or an HTTP-facing error.
    ///
    /// A successful page held from an exhausted response is returned if the
    /// retry fails for any reason.
    pub async fn fetch<U>(&self, upstream: &U, query: &SearchQuery) -> Result<Vec<U::Record>, ApiError>
    where
        U: Upstream + ?Sized,
    {
        let provider = upstream.name();
        let mut retries = 0u32;
        let mut held: Option<Vec<U::Record>> = None;

        loop {
            match upstream.fetch(query).await {
                Ok(fetched) => {
                    let Some(status) = fetched.rate_limit.filter(RateLimitStatus::is_exhausted)
                    else {
                        return Ok(fetched.records);
                    };
                    let wait_time = self.wait_time(&status);
                    counter!("upstream_rate_limited_total", "provider" => provider, "trigger" => "exhausted")
                        .increment(1);

                    match self.config.on_exhausted {
                        RateLimitPolicy::FailFast => {
                            warn!(provider, wait_time, "quota exhausted; failing fast");
                            return Err(ApiError::RateLimited { wait_time });
                        }
                        RateLimitPolicy::BlockAndRetry if self.can_block(retries, wait_time) => {
                            held = Some(fetched.records);
                            retries += 1;
                            self.block(provider, wait_time, retries).await;
                        }
                        RateLimitPolicy::BlockAndRetry => {
                            // Reset is past the block cap; keep the page.
                            debug!(provider, wait_time, "quota exhausted; returning current page without retry");
                            return Ok(fetched.records);
                        }
                    }
                }
                Err(UpstreamError::Throttled {
                    rate_limit,
                    retry_after_secs,
                    ..
                }) => {
                    let wait_time = self.throttled_wait_time(rate_limit.as_ref(), retry_after_secs);
                    counter!("upstream_rate_limited_total", "provider" => provider, "trigger" => "throttled")
                        .increment(1);

                    if let Some(records) = held.take() {
                        debug!(provider, wait_time, "retry throttled; returning held page");
                        return Ok(records);
                    }

                    match self.config.on_throttled {
                        RateLimitPolicy::BlockAndRetry if self.can_block(retries, wait_time) => {
                            retries += 1;
                            self.block(provider, wait_time, retries).await;
                        }
                        _ => {
                            warn!(provider, wait_time, "upstream throttled the request");
                            return Err(ApiError::RateLimited { wait_time });
                        }
                    }
                }
                Err(e) => {
                    if let Some(records) = held.take() {
                        warn!(provider, error = %e, "retry failed; returning held page");
                        return Ok(records);
                    }
                    warn!(provider, error = %e, "upstream fetch failed");
                    return Err(e.into());
                }
            }
        }
    }

    async fn block(&self, provider: &'static str, wait_time: u64, attempt: u32) {
        let secs = wait_time.min(self.config.max_block_secs);
        info!(provider, wait_time, sleep_secs = secs, attempt, "rate limited; sleeping before retry");
        if secs > 0 {
            counter!("rate_limit_sleep_secs_total", "provider" => provider).increment(secs);
            self.clock.sleep(Duration::from_secs(secs)).await;
        }
    }
}
