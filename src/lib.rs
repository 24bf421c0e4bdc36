// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod ratelimit;
pub mod telemetry;
pub mod upstream;

pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{ApiError, UpstreamError};

use axum::Router;
use tracing::{info, warn};

/// Build the full router from the process environment (and `config/market.toml`).
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::from_env()?;
    app_with(cfg).await
}

/// Build the full router from an explicit config.
pub async fn app_with(cfg: AppConfig) -> anyhow::Result<Router> {
    info!(twitter = ?cfg.twitter, news = ?cfg.news, "config loaded");
    if cfg.twitter.bearer_token.is_none() {
        warn!("TWITTER_BEARER_TOKEN not set; /tweets will return 500");
    }
    if cfg.news.api_key.is_none() {
        warn!("NEWS_API_KEY not set; /news will return 500");
    }

    let state = AppState::from_config(&cfg)?;
    let mut router = create_router(state);

    if cfg.debug_routes {
        if let Some(m) = metrics::Metrics::init() {
            router = router.merge(m.router());
        }
    }
    Ok(router)
}
