//! Component wiring and the operations behind each CLI command
//!
//! `App` owns one of each core component, composed explicitly from the
//! loaded config. Nothing here is global.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use common::ArtistTitle;
use radio_charts::{Chart, ChartClient, ChartKind};
use spotify_auth::{FileStore, KeyValueStore, TokenManager};
use spotify_client::{Playlist, RequestAuthorizer, SpotifyApi, TrackMatch};
use tracing::{info, warn};

use crate::callback::CallbackListener;
use crate::config::Config;

pub struct App {
    pub tokens: Arc<TokenManager>,
    pub api: SpotifyApi,
    pub charts: ChartClient,
}

/// A chart resolved to Spotify tracks, ready to publish.
#[derive(Debug)]
pub struct PlaylistPlan {
    pub title: String,
    pub description: String,
    pub matches: Vec<TrackMatch>,
}

impl PlaylistPlan {
    /// URIs of the found tracks, in chart-text order.
    pub fn uris(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter_map(|m| m.track.as_ref().map(|t| t.uri.clone()))
            .collect()
    }

    pub fn missing(&self) -> Vec<&ArtistTitle> {
        self.matches
            .iter()
            .filter(|m| m.track.is_none())
            .map(|m| &m.query)
            .collect()
    }
}

impl App {
    /// Build the components with file-backed storage.
    pub fn new(config: &Config) -> Result<Self> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage.path));
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: &Config, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chartify/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        let tokens = Arc::new(TokenManager::new(config.oauth(), http.clone(), storage));
        let authorizer = RequestAuthorizer::new(tokens.clone(), http.clone())
            .with_refresh_skew(config.refresh_skew());
        let api = SpotifyApi::new(Arc::new(authorizer));
        let charts = ChartClient::new(config.charts.base_url.clone(), http);

        Ok(Self {
            tokens,
            api,
            charts,
        })
    }

    /// Run the full login: print the authorization URL, wait for the
    /// redirect on the loopback listener, exchange the code. Returns the
    /// path carried through `state`.
    pub async fn login(&self, return_to: &str, timeout: Duration) -> Result<String> {
        let listener = CallbackListener::bind(&self.tokens.config().redirect_uri).await?;
        let url = self.tokens.login(return_to)?;

        println!("Open this URL in a browser to authorize chartify:\n\n  {url}\n");
        info!(timeout_secs = timeout.as_secs(), "waiting for authorization redirect");

        let query = listener.wait(timeout).await?;
        let return_to = self
            .tokens
            .handle_redirect(&query)
            .await
            .context("login failed")?;
        Ok(return_to)
    }

    /// Latest chart of a kind, or a specific one by number.
    pub async fn chart(&self, kind: ChartKind, number: Option<u32>) -> Result<Arc<Chart>> {
        let chart = match number {
            Some(no) => self.charts.chart_by_number(kind, no).await,
            None => self.charts.latest(kind).await,
        };
        chart.with_context(|| format!("failed to load {kind} chart"))
    }

    /// Fetch a chart and search Spotify for each of its entries.
    pub async fn plan_playlist(&self, kind: ChartKind, number: Option<u32>) -> Result<PlaylistPlan> {
        if !self.tokens.is_authenticated().await {
            bail!("not logged in; run `chartify login` first");
        }

        let chart = self.chart(kind, number).await?;
        let entries = radio_charts::track_entries(&chart);
        let matches = self.api.search_tracks(&entries).await;

        Ok(PlaylistPlan {
            title: radio_charts::playlist_title(&chart),
            description: radio_charts::playlist_description(&chart),
            matches,
        })
    }

    /// Create the playlist unless one with the same name already exists.
    pub async fn publish_playlist(&self, plan: &PlaylistPlan, public: bool) -> Result<Playlist> {
        if self
            .api
            .playlist_exists(&plan.title)
            .await
            .map_err(|e| api_failure(e, "failed to list playlists"))?
        {
            bail!("a playlist named {:?} already exists", plan.title);
        }

        let uris = plan.uris();
        if uris.is_empty() {
            warn!(title = %plan.title, "no tracks found, creating an empty playlist");
        }

        let playlist = self
            .api
            .create_playlist_with_tracks(&plan.title, &plan.description, &uris, public)
            .await
            .map_err(|e| api_failure(e, "failed to create playlist"))?;
        Ok(playlist)
    }
}

/// Wrap an API error with what was being done, plus when to try again if
/// the failure is temporary.
fn api_failure(err: spotify_client::Error, action: &str) -> anyhow::Error {
    let hint = match (err.is_retryable(), err.retry_after()) {
        (true, Some(wait)) => format!("; retry after {}s", wait.as_secs()),
        (true, None) => "; try again later".to_string(),
        (false, _) => String::new(),
    };
    anyhow::Error::new(err).context(format!("{action}{hint}"))
}
