//! Status classification for Spotify Web API responses
//!
//! Separates token rejections (which the authorizer answers with one
//! renewal) from rate limiting and ordinary failures, which surface to the
//! caller unchanged.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// What a non-success status means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 401/403: the bearer token is no longer accepted
    AuthRejected,
    /// 429: back off for `Retry-After` seconds
    RateLimited,
    /// 408/5xx: worth trying again later
    Transient,
    /// Anything else: the request itself is wrong
    Permanent,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::AuthRejected => "auth_rejected",
            Classification::RateLimited => "rate_limited",
            Classification::Transient => "transient",
            Classification::Permanent => "permanent",
        }
    }
}

/// Classify a non-success status code.
pub fn classify_status(status: u16) -> Classification {
    match status {
        401 | 403 => Classification::AuthRejected,
        429 => Classification::RateLimited,
        408 | 500 | 502 | 503 | 504 => Classification::Transient,
        _ => Classification::Permanent,
    }
}

/// Whether a response status means the token was rejected.
pub fn is_auth_rejection(status: StatusCode) -> bool {
    classify_status(status.as_u16()) == Classification::AuthRejected
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
