//! Authorized access to the Spotify Web API
//!
//! `RequestAuthorizer` attaches the session's bearer token to requests under
//! the API base and answers token rejections with one shared renewal and one
//! retry. `SpotifyApi` builds the playlist operations on top of it.
//!
//! Request lifecycle:
//! 1. Request outside the API base → sent untouched
//! 2. Token close to expiry → renewed before sending
//! 3. 401/403 → `TokenManager::refresh_shared()`, then one retry
//! 4. Second rejection or failed renewal → `Error::AuthRejected`

pub mod api;
pub mod authorizer;
pub mod classify;
pub mod error;
pub mod models;

#[cfg(test)]
mod testing;

pub use api::SpotifyApi;
pub use authorizer::{DEFAULT_REFRESH_SKEW, RequestAuthorizer};
pub use classify::{Classification, classify_status, is_auth_rejection};
pub use error::{Error, Result};
pub use models::{Paging, Playlist, SimplifiedPlaylist, Track, TrackMatch};
