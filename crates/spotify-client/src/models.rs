//! Web API payloads used by the playlist operations
//!
//! Only the fields this client reads are modelled; everything else in the
//! responses is ignored.

use common::ArtistTitle;
use serde::{Deserialize, Serialize};
use spotify_auth::profile::{ExternalUrls, Image};

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
    #[serde(default)]
    pub tracks: Option<TracksRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TracksRef {
    pub total: u32,
}

/// Playlist as returned by `POST /users/{id}/playlists`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Track {
    /// Comma-joined artist names.
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlbumRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub tracks: Option<Paging<Track>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewPlaylist<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddTracks<'a> {
    pub uris: &'a [String],
}

/// A chart entry and the track found for it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMatch {
    pub query: ArtistTitle,
    pub track: Option<Track>,
}
