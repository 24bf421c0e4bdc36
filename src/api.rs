use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::model::{NewsArticle, SearchQuery, Tweet};
use crate::ratelimit::RateLimitGuard;
use crate::upstream::{build_http_client, NewsClient, TwitterClient, Upstream};

pub const WELCOME_MESSAGE: &str = "Welcome to the Market Research API!";
pub const STATUS_MESSAGE: &str = "API is working!";

/// One provider plus the guard that owns its rate-limit policy.
pub struct SearchEndpoint<R> {
    upstream: Arc<dyn Upstream<Record = R>>,
    guard: RateLimitGuard,
}

impl<R> SearchEndpoint<R> {
    pub fn new(upstream: Arc<dyn Upstream<Record = R>>, guard: RateLimitGuard) -> Self {
        Self { upstream, guard }
    }
}

impl<R> Clone for SearchEndpoint<R> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            guard: self.guard.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub twitter: SearchEndpoint<Tweet>,
    pub news: SearchEndpoint<NewsArticle>,
}

impl AppState {
    /// Build real provider clients from config. One HTTP client is shared by both.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let http = build_http_client(&cfg.http)?;
        let twitter = TwitterClient::new(http.clone(), &cfg.twitter);
        let news = NewsClient::new(http, &cfg.news);
        Ok(Self {
            twitter: SearchEndpoint::new(
                Arc::new(twitter),
                RateLimitGuard::new(cfg.twitter.rate_limit.clone()),
            ),
            news: SearchEndpoint::new(
                Arc::new(news),
                RateLimitGuard::new(cfg.news.rate_limit.clone()),
            ),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api", get(api_status))
        .route("/health", get(|| async { "ok" }))
        .route("/tweets", get(tweets))
        .route("/news", get(news))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct MessageResp {
    message: &'static str,
}

async fn home() -> Json<MessageResp> {
    Json(MessageResp {
        message: WELCOME_MESSAGE,
    })
}

async fn api_status() -> Json<MessageResp> {
    Json(MessageResp {
        message: STATUS_MESSAGE,
    })
}

async fn tweets(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Tweet>>, ApiError> {
    search(&state.twitter, &params).await.map(Json)
}

async fn news(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<NewsArticle>>, ApiError> {
    search(&state.news, &params).await.map(Json)
}

async fn search<R: Send>(
    endpoint: &SearchEndpoint<R>,
    params: &HashMap<String, String>,
) -> Result<Vec<R>, ApiError> {
    let query = SearchQuery::from_params(params)?;
    let provider = endpoint.upstream.name();
    info!(provider, keyword = %query.keyword, count = query.count, "search");

    let records = endpoint.guard.fetch(endpoint.upstream.as_ref(), &query).await?;
    info!(provider, returned = records.len(), "search done");
    Ok(records)
}
