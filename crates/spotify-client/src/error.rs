//! Error types for authorized Spotify API calls

use std::time::Duration;

use crate::classify::{Classification, classify_status};

/// Errors from the request authorizer and the Web API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A protected request was still rejected after the one allowed renewal,
    /// or the renewal itself failed. `status` is the rejection that ended it.
    #[error("request rejected with status {status}: {reason}")]
    AuthRejected { status: u16, reason: String },

    /// Non-success status. `retry_after` is the server's `Retry-After`, in
    /// whole seconds, when it sent one.
    #[error("API returned {status}: {body}")]
    Api {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error(transparent)]
    Auth(#[from] spotify_auth::Error),
}

impl Error {
    /// Whether the user has to log in again before this can succeed.
    pub fn requires_login(&self) -> bool {
        match self {
            Error::AuthRejected { .. } => true,
            Error::Auth(e) => e.requires_login(),
            _ => false,
        }
    }

    /// How an API status failure should be treated. `None` for failures
    /// that never got a status back.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Error::AuthRejected { .. } => Some(Classification::AuthRejected),
            Error::Api { status, .. } => Some(classify_status(*status)),
            _ => None,
        }
    }

    /// Whether the same request may succeed later without any change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(Classification::RateLimited | Classification::Transient)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result alias for Spotify API operations.
pub type Result<T> = std::result::Result<T, Error>;
