//! Error types for Spotify authentication operations

/// Errors from the token lifecycle.
///
/// `Clone` so a single refresh outcome can be broadcast to every request
/// waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("no PKCE verifier stored for this callback; restart the login")]
    MissingVerifier,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("no refresh token available; log in again")]
    NoRefreshToken,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid OAuth configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the session is unrecoverable and the user has to log in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Error::MissingVerifier
                | Error::TokenExchangeFailed(_)
                | Error::RefreshFailed(_)
                | Error::NoRefreshToken
                | Error::Unauthenticated
                | Error::AuthorizationDenied(_)
        )
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
