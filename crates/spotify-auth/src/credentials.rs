//! Token record persistence
//!
//! The current token record lives under one storage key as a single JSON
//! blob, so a write either lands whole or not at all. The PKCE verifier of an
//! outstanding login lives under a second key. Both are opaque to everything
//! except the token manager.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{KEY_TOKEN, KEY_VERIFIER};
use crate::error::Result;
use crate::storage::KeyValueStore;
use crate::token::TokenResponse;

/// The persisted OAuth credential.
///
/// `expires_at` is a unix timestamp in milliseconds, computed at storage time
/// from `expires_in`. Records written before it existed load with `None`,
/// which is treated as "not known to be expired".
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl TokenRecord {
    /// Record for a fresh code exchange.
    pub fn from_response(response: TokenResponse, now_millis: u64) -> Self {
        Self {
            expires_at: Some(now_millis.saturating_add(response.expires_in.saturating_mul(1000))),
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            scope: response.scope.unwrap_or_default(),
        }
    }

    /// Record after a refresh: the response replaces this one wholesale,
    /// except that a missing refresh token (and scope) carries forward.
    pub fn renewed(&self, response: TokenResponse, now_millis: u64) -> Self {
        let refresh_token = response
            .refresh_token
            .clone()
            .or_else(|| self.refresh_token.clone());
        let scope = response.scope.clone().unwrap_or_else(|| self.scope.clone());
        Self {
            refresh_token,
            scope,
            ..Self::from_response(response, now_millis)
        }
    }

    /// Whether the access token expires within `skew` of `now_millis`.
    pub fn expires_within(&self, skew: Duration, now_millis: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let skew = u64::try_from(skew.as_millis()).unwrap_or(u64::MAX);
                expires_at <= now_millis.saturating_add(skew)
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Loads and saves the token record through the storage capability.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn save(&self, record: &TokenRecord) -> Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| crate::Error::Storage(format!("serializing token record: {e}")))?;
        self.storage.set(KEY_TOKEN, &json)?;
        debug!("persisted token record");
        Ok(())
    }

    /// Load the stored record. Malformed data counts as absent.
    pub fn load(&self) -> Option<TokenRecord> {
        let raw = self.storage.get(KEY_TOKEN)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "stored token record is malformed, ignoring it");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(KEY_TOKEN)
    }
}

/// The verifier of the single outstanding login attempt.
#[derive(Clone)]
pub struct PkceSession {
    storage: Arc<dyn KeyValueStore>,
}

impl PkceSession {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn save(&self, verifier: &str) -> Result<()> {
        self.storage.set(KEY_VERIFIER, verifier)
    }

    pub fn load(&self) -> Option<String> {
        self.storage.get(KEY_VERIFIER).filter(|v| !v.is_empty())
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(KEY_VERIFIER)
    }
}
