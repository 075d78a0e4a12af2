//! Shared fixtures for the request-level tests.

use std::sync::Arc;

use spotify_auth::{CredentialStore, MemoryStore, OAuthConfig, TokenManager, TokenRecord};
use wiremock::MockServer;

use crate::authorizer::RequestAuthorizer;

/// Far enough out that proactive renewal never kicks in.
const FAR_FUTURE_MILLIS: u64 = 4_102_444_800_000;

pub(crate) fn test_config(server: &MockServer) -> OAuthConfig {
    let mut config = OAuthConfig::new("client-123");
    config.token_endpoint = format!("{}/api/token", server.uri());
    config.api_base = format!("{}/v1", server.uri());
    config
}

pub(crate) fn manager(server: &MockServer, session: Option<(&str, Option<&str>)>) -> Arc<TokenManager> {
    match session {
        Some((access, refresh)) => manager_with_expiry(server, access, refresh, Some(FAR_FUTURE_MILLIS)),
        None => Arc::new(TokenManager::new(
            test_config(server),
            reqwest::Client::new(),
            Arc::new(MemoryStore::new()),
        )),
    }
}

pub(crate) fn manager_with_expiry(
    server: &MockServer,
    access: &str,
    refresh: Option<&str>,
    expires_at: Option<u64>,
) -> Arc<TokenManager> {
    let storage = Arc::new(MemoryStore::new());
    CredentialStore::new(storage.clone())
        .save(&TokenRecord {
            access_token: access.into(),
            token_type: "Bearer".into(),
            expires_in: 3600,
            refresh_token: refresh.map(String::from),
            scope: "playlist-modify-public".into(),
            expires_at,
        })
        .unwrap();
    Arc::new(TokenManager::new(
        test_config(server),
        reqwest::Client::new(),
        storage,
    ))
}

pub(crate) fn authorizer(tokens: Arc<TokenManager>) -> RequestAuthorizer {
    RequestAuthorizer::new(tokens, reqwest::Client::new())
}

pub(crate) fn token_body(access: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 3600
    })
}
