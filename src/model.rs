// src/model.rs
//! Per-request query parameters and the normalized records returned to callers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

pub const DEFAULT_KEYWORD: &str = "technology";
pub const DEFAULT_COUNT: u8 = 10;
pub const MIN_COUNT: u8 = 1;
/// Upstream page-size ceiling shared by both providers.
pub const MAX_COUNT: u8 = 100;

/// Search parameters bound from the inbound query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub count: u8,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            count: DEFAULT_COUNT,
        }
    }
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, count: i64) -> Self {
        let keyword = keyword.into();
        let keyword = keyword.trim();
        Self {
            keyword: if keyword.is_empty() {
                DEFAULT_KEYWORD.to_string()
            } else {
                keyword.to_string()
            },
            count: clamp_count(count),
        }
    }

    /// Bind `keyword` and `count` from raw query params.
    /// Only a non-numeric `count` is rejected; everything else is defaulted or clamped.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let keyword = params.get("keyword").map(String::as_str).unwrap_or_default();
        let count = match params.get("count").map(|s| s.trim()) {
            None | Some("") => i64::from(DEFAULT_COUNT),
            Some(raw) => parse_count(raw)?,
        };
        Ok(Self::new(keyword, count))
    }
}

pub fn clamp_count(raw: i64) -> u8 {
    // clamp() keeps the value inside u8 range, so the cast is lossless
    raw.clamp(i64::from(MIN_COUNT), i64::from(MAX_COUNT)) as u8
}

fn parse_count(raw: &str) -> Result<i64, ApiError> {
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    // Integers wider than i64 still have an obvious nearest bound.
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(if negative { i64::MIN } else { i64::MAX });
    }
    Err(ApiError::BadRequest(format!(
        "invalid 'count' parameter: '{raw}' is not an integer"
    )))
}

/// One post from the social search provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tweet {
    pub id: Option<String>,
    pub text: Option<String>,
    pub author_id: Option<String>,
    pub created_at: Option<String>,
}

impl Tweet {
    pub fn from_value(v: &Value) -> Self {
        Self {
            id: scalar_field(v, "id"),
            text: scalar_field(v, "text"),
            author_id: scalar_field(v, "author_id"),
            created_at: scalar_field(v, "created_at"),
        }
    }
}

/// One article from the news provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsArticle {
    pub source: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

impl NewsArticle {
    pub fn from_value(v: &Value) -> Self {
        // NewsAPI nests the outlet as {"source": {"id": .., "name": ..}}
        let source = match v.get("source") {
            Some(obj @ Value::Object(_)) => scalar_field(obj, "name"),
            Some(other) => scalar(other),
            None => None,
        };
        Self {
            source,
            author: scalar_field(v, "author"),
            title: scalar_field(v, "title"),
            description: scalar_field(v, "description"),
            url: scalar_field(v, "url"),
            published_at: scalar_field(v, "publishedAt"),
        }
    }
}

fn scalar_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(scalar)
}

/// Strings pass through, numbers/bools are stringified, everything else is null.
fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
