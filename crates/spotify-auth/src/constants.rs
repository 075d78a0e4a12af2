//! Spotify OAuth constants
//!
//! Public endpoints and the storage layout. Nothing here is secret: the
//! authorization-code-with-PKCE flow is designed for public clients, so the
//! client id ships in configuration and only the tokens need protecting.

/// Authorization endpoint the user agent is sent to for consent
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Base of the protected Web API. Only requests under this prefix carry the
/// bearer token.
pub const API_BASE: &str = "https://api.spotify.com/v1";

/// Loopback redirect used by the CLI callback listener
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Scopes needed to read the profile and write playlists on the user's behalf.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-modify-public",
    "playlist-modify-private",
];

/// Storage key holding the serialized token record
pub const KEY_TOKEN: &str = "spotify_token";

/// Storage key holding the PKCE verifier of the outstanding login attempt
pub const KEY_VERIFIER: &str = "spotify_code_verifier";

/// Default PKCE verifier length (RFC 7636 allows 43..=128)
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

/// Token endpoint timeout. A refresh that outlives it counts as failed.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;
