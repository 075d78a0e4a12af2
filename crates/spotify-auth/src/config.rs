//! OAuth client settings
//!
//! Built by the binary from its TOML config; the library never reads files
//! or the environment itself.

use std::time::Duration;

use crate::constants::{
    API_BASE, AUTHORIZE_ENDPOINT, DEFAULT_REDIRECT_URI, DEFAULT_REFRESH_TIMEOUT_SECS, SCOPES,
    TOKEN_ENDPOINT,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    /// Prefix of the protected API, e.g. `https://api.spotify.com/v1`
    pub api_base: String,
    /// Upper bound on a single token endpoint call
    pub refresh_timeout: Duration,
}

impl OAuthConfig {
    /// Config pointing at the public Spotify endpoints with the default scopes.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            api_base: API_BASE.to_string(),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }

    /// Space-joined scope list as sent in the authorization request.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    /// Resolve a path under the API base (`"me"` -> `{api_base}/me`).
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("client_id must not be empty".into()));
        }
        if self.scopes.is_empty() {
            return Err(Error::Config("at least one scope is required".into()));
        }
        if self.refresh_timeout.is_zero() {
            return Err(Error::Config("refresh timeout must be non-zero".into()));
        }
        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorize_endpoint", &self.authorize_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("api_base", &self.api_base),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(Error::Config(format!(
                    "{name} must start with http:// or https://, got: {value}"
                )));
            }
        }
        Ok(())
    }
}
