// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ratelimit::RateLimitStatus;

/// Failures reported by a provider adapter. Throttling is kept separate so the
/// rate-limit guard can decide what to do with it.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("{provider} is not configured: missing {setting}")]
    NotConfigured {
        provider: &'static str,
        setting: &'static str,
    },
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} response could not be decoded: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} rejected the request: too many requests")]
    Throttled {
        provider: &'static str,
        rate_limit: Option<RateLimitStatus>,
        /// Relative `Retry-After`, resolved against the guard's clock.
        retry_after_secs: Option<u64>,
    },
}

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Upstream(String),
    #[error("Rate limit exceeded")]
    RateLimited { wait_time: u64 },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::RateLimited { wait_time } => json!({
                "error": self.to_string(),
                "wait_time": wait_time,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}
