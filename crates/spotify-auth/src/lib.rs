//! Spotify OAuth authentication library
//!
//! Provides PKCE generation, authorization code exchange and refresh, token
//! record persistence, and the `TokenManager` that owns the session. This
//! crate has no dependency on the CLI and can be tested on its own.
//!
//! Session flow:
//! 1. `TokenManager::login()` stores a verifier and returns the authorize URL
//! 2. The user authorizes and is redirected back with `code` and `state`
//! 3. `TokenManager::handle_callback()` exchanges the code and stores the token
//! 4. Requests read `TokenManager::access_token()`
//! 5. On rejection, `TokenManager::refresh_shared()` renews the token once
//!    for every waiting request
//! 6. `TokenManager::logout()` clears everything

pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod pkce;
pub mod profile;
pub mod storage;
pub mod token;

pub use config::OAuthConfig;
pub use constants::*;
pub use credentials::{CredentialStore, PkceSession, TokenRecord, now_millis};
pub use error::{Error, Result};
pub use manager::{TokenManager, TokenState};
pub use pkce::{PkcePair, build_authorization_url, derive_challenge, generate_verifier};
pub use profile::UserProfile;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use token::{TokenResponse, exchange_code, refresh_token};
