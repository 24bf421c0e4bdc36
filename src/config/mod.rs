// src/config/mod.rs
//! Service configuration: optional TOML file for non-secret settings, then
//! environment (or secret store) overrides. Credentials are only ever read
//! from the lookup, never from the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::ratelimit::RateLimitConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/market.toml";
pub const ENV_CONFIG_PATH: &str = "MARKET_CONFIG_PATH";

pub const ENV_TWITTER_BEARER_TOKEN: &str = "TWITTER_BEARER_TOKEN";
pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const ENV_TWITTER_API_BASE: &str = "TWITTER_API_BASE";
pub const ENV_NEWS_API_BASE: &str = "NEWS_API_BASE";
pub const ENV_UPSTREAM_TIMEOUT_SECS: &str = "UPSTREAM_TIMEOUT_SECS";
pub const ENV_RATE_LIMIT_MAX_BLOCK_SECS: &str = "RATE_LIMIT_MAX_BLOCK_SECS";
pub const ENV_RATE_LIMIT_MAX_RETRIES: &str = "RATE_LIMIT_MAX_RETRIES";
pub const ENV_DEBUG_ROUTES: &str = "DEBUG_ROUTES";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub twitter: TwitterConfig,
    pub news: NewsConfig,
    /// Mounts `/metrics` when set.
    pub debug_routes: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 4,
            timeout_secs: 10,
            user_agent: concat!("market-research-api/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub base_url: String,
    #[serde(skip)]
    pub bearer_token: Option<String>,
    pub rate_limit: RateLimitConfig,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com".to_string(),
            bearer_token: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub rate_limit: RateLimitConfig,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org".to_string(),
            api_key: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

// Never print credentials; only whether they are set and their length.
fn redacted(secret: &Option<String>) -> String {
    match secret {
        Some(s) => format!("<set, len={}>", s.len()),
        None => "<unset>".to_string(),
    }
}

impl fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("base_url", &self.base_url)
            .field("bearer_token", &redacted(&self.bearer_token))
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl fmt::Debug for NewsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the config file, then apply overrides from `lookup`:
    /// 1) $MARKET_CONFIG_PATH (must exist)
    /// 2) config/market.toml (if present)
    /// 3) built-in defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(ENV_CONFIG_PATH) {
            Some(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::load_from_file(&pb)?
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(&lookup)?;
        Ok(cfg)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = get(ENV_TWITTER_BEARER_TOKEN) {
            self.twitter.bearer_token = Some(token);
        }
        if let Some(key) = get(ENV_NEWS_API_KEY) {
            self.news.api_key = Some(key);
        }
        if let Some(base) = get(ENV_TWITTER_API_BASE) {
            self.twitter.base_url = base;
        }
        if let Some(base) = get(ENV_NEWS_API_BASE) {
            self.news.base_url = base;
        }
        if let Some(v) = get(ENV_UPSTREAM_TIMEOUT_SECS) {
            self.http.timeout_secs = parse_env(ENV_UPSTREAM_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(ENV_RATE_LIMIT_MAX_BLOCK_SECS) {
            let secs: u64 = parse_env(ENV_RATE_LIMIT_MAX_BLOCK_SECS, &v)?;
            self.twitter.rate_limit.max_block_secs = secs;
            self.news.rate_limit.max_block_secs = secs;
        }
        if let Some(v) = get(ENV_RATE_LIMIT_MAX_RETRIES) {
            let n: u32 = parse_env(ENV_RATE_LIMIT_MAX_RETRIES, &v)?;
            self.twitter.rate_limit.max_retries = n;
            self.news.rate_limit.max_retries = n;
        }
        if let Some(v) = get(ENV_DEBUG_ROUTES) {
            self.debug_routes = v == "1" || v.eq_ignore_ascii_case("true");
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'"))
}
