// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// Providers are replaced by in-process fakes; the router is driven via
// tower::ServiceExt::oneshot.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use market_research_api::api::{self, AppState, SearchEndpoint};
use market_research_api::error::UpstreamError;
use market_research_api::model::{NewsArticle, SearchQuery, Tweet};
use market_research_api::ratelimit::{RateLimitConfig, RateLimitGuard, RateLimitStatus};
use market_research_api::upstream::{Fetched, Upstream};

const BODY_LIMIT: usize = 1024 * 1024;

/// Fake provider: returns a fixed outcome and remembers the queries it saw.
struct Fake<R> {
    outcome: Result<Fetched<R>, UpstreamError>,
    seen: Mutex<Vec<SearchQuery>>,
}

impl<R> Fake<R> {
    fn new(outcome: Result<Fetched<R>, UpstreamError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            seen: Mutex::new(Vec::new()),
        })
    }
    fn seen(&self) -> Vec<SearchQuery> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl<R: Clone + Send + Sync + 'static> Upstream for Fake<R> {
    type Record = R;

    async fn fetch(&self, query: &SearchQuery) -> Result<Fetched<R>, UpstreamError> {
        self.seen.lock().unwrap().push(query.clone());
        self.outcome.clone()
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

fn ok<R>(records: Vec<R>) -> Result<Fetched<R>, UpstreamError> {
    Ok(Fetched {
        records,
        rate_limit: None,
    })
}

fn transport_error() -> UpstreamError {
    UpstreamError::Transport {
        provider: "fake",
        message: "connection refused".into(),
    }
}

fn router_with(tweets: Arc<Fake<Tweet>>, news: Arc<Fake<NewsArticle>>) -> Router {
    let state = AppState {
        twitter: SearchEndpoint::new(tweets, RateLimitGuard::new(RateLimitConfig::default())),
        news: SearchEndpoint::new(news, RateLimitGuard::new(RateLimitConfig::default())),
    };
    api::create_router(state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

fn sample_tweet() -> Tweet {
    Tweet {
        id: Some("1".into()),
        text: Some("Markets up".into()),
        author_id: None,
        created_at: Some("2024-01-01T00:00:00.000Z".into()),
    }
}

#[tokio::test]
async fn fixed_messages_ignore_query_params() {
    let app = router_with(Fake::new(ok(vec![])), Fake::new(ok(vec![])));

    for uri in ["/", "/?keyword=x&count=abc"] {
        let (status, v) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "Welcome to the Market Research API!");
    }
    for uri in ["/api", "/api?count=-1"] {
        let (status, v) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "API is working!");
    }
}

#[tokio::test]
async fn tweets_serializes_records_with_null_fields() {
    let tweets = Fake::new(ok(vec![sample_tweet()]));
    let app = router_with(tweets.clone(), Fake::new(ok(vec![])));

    let (status, v) = get(app, "/tweets?keyword=stocks&count=5").await;
    assert_eq!(status, StatusCode::OK);
    let arr = v.as_array().expect("array body");
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["id"], "1");
    assert!(arr[0].get("author_id").is_some_and(Json::is_null));

    assert_eq!(tweets.seen(), vec![SearchQuery::new("stocks", 5)]);
}

#[tokio::test]
async fn defaults_and_clamping_reach_the_provider() {
    let tweets = Fake::new(ok(vec![]));
    let news = Fake::new(ok(vec![]));
    let app = router_with(tweets.clone(), news.clone());

    get(app.clone(), "/tweets").await;
    get(app.clone(), "/tweets?count=500").await;
    get(app.clone(), "/news?count=0").await;
    get(app.clone(), "/news?count=-3&keyword=").await;

    let t = tweets.seen();
    assert_eq!(t[0].keyword, "technology");
    assert_eq!(t[0].count, 10);
    assert_eq!(t[1].count, 100);
    let n = news.seen();
    assert_eq!(n[0].count, 1);
    assert_eq!(n[1].count, 1);
    assert_eq!(n[1].keyword, "technology");
}

#[tokio::test]
async fn empty_results_are_200_with_empty_list() {
    let app = router_with(Fake::new(ok(vec![])), Fake::new(ok(vec![])));

    for uri in ["/tweets", "/news"] {
        let (status, v) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(v, serde_json::json!([]), "{uri}");
    }
}

#[tokio::test]
async fn non_numeric_count_is_400() {
    let tweets = Fake::new(ok(vec![]));
    let app = router_with(tweets.clone(), Fake::new(ok(vec![])));

    let (status, v) = get(app, "/tweets?count=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().is_some_and(|s| s.contains("count")));
    assert!(tweets.seen().is_empty(), "provider must not be called");
}

#[tokio::test]
async fn upstream_failure_is_500_for_both_endpoints() {
    let app = router_with(
        Fake::new(Err(transport_error())),
        Fake::new(Err(transport_error())),
    );

    for uri in ["/tweets", "/news"] {
        let (status, v) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        let msg = v["error"].as_str().expect("error string");
        assert!(!msg.is_empty());
        assert!(msg.contains("connection refused"));
    }
}

#[tokio::test]
async fn throttled_tweets_is_429_with_wait_time() {
    let reset = chrono::Utc::now().timestamp() + 30;
    let tweets = Fake::new(Err(UpstreamError::Throttled {
        provider: "fake",
        rate_limit: Some(RateLimitStatus {
            remaining: 0,
            reset_epoch_seconds: reset,
        }),
        retry_after_secs: None,
    }));
    let app = router_with(tweets, Fake::new(ok(vec![])));

    let (status, v) = get(app, "/tweets?keyword=ai").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(v["error"], "Rate limit exceeded");
    let wait = v["wait_time"].as_u64().expect("wait_time");
    assert!((28..=30).contains(&wait), "wait_time={wait}");
}

#[tokio::test]
async fn throttled_with_past_reset_reports_zero_wait() {
    let tweets = Fake::new(Err(UpstreamError::Throttled {
        provider: "fake",
        rate_limit: Some(RateLimitStatus {
            remaining: 0,
            reset_epoch_seconds: chrono::Utc::now().timestamp() - 120,
        }),
        retry_after_secs: None,
    }));
    let app = router_with(tweets, Fake::new(ok(vec![])));

    let (status, v) = get(app, "/tweets").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(v["wait_time"], 0);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = router_with(Fake::new(ok(vec![])), Fake::new(ok(vec![])));

    let req = Request::builder()
        .method("GET")
        .uri("/api")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .expect("build GET");
    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .contains_key("access-control-allow-origin"));
}
