//! OAuth token endpoint calls
//!
//! Two interactions, both a form-encoded POST to the token endpoint:
//! 1. Authorization code exchange (completes the PKCE login)
//! 2. Refresh (renews an access token with the stored refresh token)
//!
//! Both carry the configured timeout. A call that outlives it is a failure
//! like any other, which for refresh means the session ends.

use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// Token endpoint response for both exchange and refresh.
///
/// Spotify only sometimes rotates the refresh token on refresh, so it is
/// optional here and the caller carries the previous one forward.
#[derive(Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Exchange an authorization code for tokens.
///
/// The verifier proves this client started the flow the code belongs to.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_endpoint)
        .timeout(config.refresh_timeout)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::TokenExchangeFailed(format!("token endpoint unreachable: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchangeFailed(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchangeFailed(format!("invalid token response: {e}")))
}

/// Trade a refresh token for a new access token.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &OAuthConfig,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_endpoint)
        .timeout(config.refresh_timeout)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
        ])
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::RefreshFailed(format!(
                    "token endpoint timed out after {}s",
                    config.refresh_timeout.as_secs_f32()
                ))
            } else {
                Error::RefreshFailed(format!("token endpoint unreachable: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::RefreshFailed(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::RefreshFailed(format!("invalid refresh response: {e}")))
}
