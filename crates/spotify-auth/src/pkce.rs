//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The verifier stays on this machine until the code exchange; only its S256
//! challenge travels in the authorization URL. A party that intercepts the
//! redirect gets a code it cannot redeem without the verifier.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::OAuthConfig;
use crate::constants::DEFAULT_VERIFIER_LENGTH;
use crate::error::{Error, Result};

/// Unreserved characters allowed in a verifier (subset of RFC 7636 §4.1).
const VERIFIER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the charset size that fits in a byte. Bytes at or
/// above it are rejected so every character is equally likely.
const REJECTION_BOUND: u8 = (256 / VERIFIER_CHARSET.len() * VERIFIER_CHARSET.len()) as u8;

/// A verifier and the challenge derived from it.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let verifier = generate_verifier(DEFAULT_VERIFIER_LENGTH);
        let challenge = derive_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate a random PKCE code verifier of `length` alphanumeric characters.
///
/// Draws from the thread-local CSPRNG (ChaCha, seeded from the OS).
pub fn generate_verifier(length: usize) -> String {
    let mut verifier = String::with_capacity(length);
    let mut rng = rand::rng();
    let mut bytes = [0u8; 64];

    while verifier.len() < length {
        rng.fill(&mut bytes);
        for &byte in bytes.iter().filter(|&&b| b < REJECTION_BOUND) {
            let idx = byte as usize % VERIFIER_CHARSET.len();
            verifier.push(VERIFIER_CHARSET[idx] as char);
            if verifier.len() == length {
                break;
            }
        }
    }

    verifier
}

/// Compute the S256 code challenge: `BASE64URL-NOPAD(SHA256(verifier))`.
pub fn derive_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the authorization URL the user agent is redirected to.
///
/// `state` carries the path the user should land on after login; the
/// authorization server echoes it back untouched in the redirect.
pub fn build_authorization_url(config: &OAuthConfig, state: &str, challenge: &str) -> Result<String> {
    let scope = config.scope_param();
    let url = Url::parse_with_params(
        &config.authorize_endpoint,
        &[
            ("client_id", config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
            ("code_challenge_method", "S256"),
            ("code_challenge", challenge),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid authorize endpoint: {e}")))?;

    Ok(url.into())
}
