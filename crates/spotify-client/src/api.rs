//! Spotify Web API operations used to publish charts as playlists
//!
//! Every call is built against the configured API base and sent through the
//! `RequestAuthorizer`, so token renewal is handled below this layer.

use std::sync::Arc;

use common::ArtistTitle;
use futures_util::future::join_all;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use spotify_auth::UserProfile;
use tracing::{debug, info, warn};
use url::Url;

use crate::authorizer::RequestAuthorizer;
use crate::classify::{classify_status, retry_after};
use crate::error::{Error, Result};
use crate::models::{
    AddTracks, NewPlaylist, Paging, Playlist, SearchResponse, SimplifiedPlaylist, Track, TrackMatch,
};

/// Page size for playlist listings.
pub const PLAYLIST_PAGE_SIZE: u32 = 50;

/// Most URIs accepted by one add-tracks call.
pub const MAX_TRACKS_PER_REQUEST: usize = 100;

pub struct SpotifyApi {
    authorizer: Arc<RequestAuthorizer>,
}

impl SpotifyApi {
    pub fn new(authorizer: Arc<RequestAuthorizer>) -> Self {
        Self { authorizer }
    }

    /// Current user, with the token manager's own one-retry handling.
    pub async fn profile(&self) -> Result<UserProfile> {
        Ok(self.authorizer.tokens().get_profile().await?)
    }

    pub async fn user_playlists(&self, limit: u32, offset: u32) -> Result<Paging<SimplifiedPlaylist>> {
        let mut url = self.endpoint(&["me", "playlists"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        self.get_json(url).await
    }

    /// Best match for one chart entry. Failures are logged and read as "not
    /// found" so one bad search never sinks a whole chart.
    pub async fn search_track(&self, entry: &ArtistTitle) -> Option<Track> {
        let mut url = match self.endpoint(&["search"]) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build search URL");
                return None;
            }
        };
        url.query_pairs_mut()
            .append_pair("q", &entry.query())
            .append_pair("type", "track")
            .append_pair("limit", "1");

        match self.get_json::<SearchResponse>(url).await {
            Ok(response) => {
                let track = response.tracks.and_then(|page| page.items.into_iter().next());
                if track.is_none() {
                    debug!(position = entry.position, query = %entry.query(), "no track found");
                }
                track
            }
            Err(e) => {
                warn!(position = entry.position, query = %entry.query(), error = %e, "track search failed");
                None
            }
        }
    }

    /// Search every entry concurrently. Results keep the input order.
    pub async fn search_tracks(&self, entries: &[ArtistTitle]) -> Vec<TrackMatch> {
        let searches = entries.iter().map(|entry| async move {
            TrackMatch {
                query: entry.clone(),
                track: self.search_track(entry).await,
            }
        });
        let matches = join_all(searches).await;
        let found = matches.iter().filter(|m| m.track.is_some()).count();
        info!(searched = entries.len(), found, "track search finished");
        matches
    }

    /// Whether the user already has a playlist with this name, compared
    /// trimmed and case-insensitively across every page.
    pub async fn playlist_exists(&self, name: &str) -> Result<bool> {
        let wanted = name.trim().to_lowercase();
        let mut offset = 0;
        loop {
            let page = self.user_playlists(PLAYLIST_PAGE_SIZE, offset).await?;
            if page
                .items
                .iter()
                .any(|p| p.name.trim().to_lowercase() == wanted)
            {
                return Ok(true);
            }
            if page.next.is_none() || page.items.is_empty() {
                return Ok(false);
            }
            offset += PLAYLIST_PAGE_SIZE;
        }
    }

    /// Create a playlist for the current user and fill it.
    pub async fn create_playlist_with_tracks(
        &self,
        name: &str,
        description: &str,
        uris: &[String],
        public: bool,
    ) -> Result<Playlist> {
        let profile = self.profile().await?;
        let url = self.endpoint(&["users", &profile.id, "playlists"])?;
        let body = NewPlaylist {
            name,
            description,
            public,
        };
        let playlist: Playlist = self.send_json(Method::POST, url, &body).await?;
        info!(playlist_id = %playlist.id, name, tracks = uris.len(), "playlist created");

        if !uris.is_empty() {
            self.add_tracks(&playlist.id, uris).await?;
        }
        Ok(playlist)
    }

    /// Append tracks, splitting into calls of at most 100 URIs.
    pub async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        for chunk in uris.chunks(MAX_TRACKS_PER_REQUEST) {
            let url = self.endpoint(&["playlists", playlist_id, "tracks"])?;
            let _: serde_json::Value = self
                .send_json(Method::POST, url, &AddTracks { uris: chunk })
                .await?;
            debug!(playlist_id, added = chunk.len(), "tracks added");
        }
        Ok(())
    }

    /// Unfollow, which is how the Web API deletes a user's own playlist.
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let url = self.endpoint(&["playlists", playlist_id, "followers"])?;
        let request = self
            .authorizer
            .http()
            .delete(url)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        let response = self.authorizer.execute(request).await?;
        check(response).await?;
        info!(playlist_id, "playlist deleted");
        Ok(())
    }

    /// URL under the API base with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let base = &self.authorizer.tokens().config().api_base;
        let mut url = Url::parse(base).map_err(|e| Error::Http(format!("invalid API base {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::Http(format!("API base {base} cannot take a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let request = self
            .authorizer
            .http()
            .get(url)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        let response = self.authorizer.execute(request).await?;
        decode(check(response).await?).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(&self, method: Method, url: Url, body: &B) -> Result<T> {
        let request = self
            .authorizer
            .http()
            .request(method, url)
            .json(body)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        let response = self.authorizer.execute(request).await?;
        decode(check(response).await?).await
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let class = classify_status(status.as_u16());
    let wait = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    warn!(
        status = status.as_u16(),
        class = class.label(),
        retry_after_secs = wait.map(|d| d.as_secs()),
        "Spotify API request failed"
    );
    Err(Error::Api {
        status: status.as_u16(),
        body,
        retry_after: wait,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
}
