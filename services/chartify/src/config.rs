//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client id may come from SPOTIFY_CLIENT_ID instead of the file; when
//! it does, the file itself is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use spotify_auth::OAuthConfig;

/// Env var that overrides `spotify.client_id`.
pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub storage: StorageConfig,
    pub charts: ChartsConfig,
}

/// Spotify application and endpoint settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub api_base: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub refresh_timeout_secs: u64,
    /// Renew tokens this many seconds before they expire
    pub refresh_skew_secs: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: spotify_auth::DEFAULT_REDIRECT_URI.to_string(),
            scopes: spotify_auth::SCOPES.iter().map(|s| s.to_string()).collect(),
            api_base: spotify_auth::API_BASE.to_string(),
            authorize_endpoint: spotify_auth::AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: spotify_auth::TOKEN_ENDPOINT.to_string(),
            refresh_timeout_secs: spotify_auth::DEFAULT_REFRESH_TIMEOUT_SECS,
            refresh_skew_secs: spotify_client::DEFAULT_REFRESH_SKEW.as_secs(),
        }
    }
}

/// Where the token record and PKCE verifier are kept
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chartify-storage.json"),
        }
    }
}

/// Radio chart API settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub base_url: String,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            base_url: radio_charts::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file is accepted only when SPOTIFY_CLIENT_ID is set, since
    /// every other field has a usable default.
    pub fn load(path: &Path) -> common::Result<Self> {
        let env_client_id = std::env::var(CLIENT_ID_ENV)
            .ok()
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());

        let mut config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && env_client_id.is_some() => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(id) = env_client_id {
            config.spotify.client_id = id;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        self.oauth()
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;

        if !self.charts.base_url.starts_with("http://")
            && !self.charts.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "charts.base_url must start with http:// or https://, got: {}",
                self.charts.base_url
            )));
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(common::Error::Config(
                "storage.path must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// OAuth settings for the token manager.
    pub fn oauth(&self) -> OAuthConfig {
        let spotify = &self.spotify;
        OAuthConfig {
            client_id: spotify.client_id.clone(),
            redirect_uri: spotify.redirect_uri.clone(),
            scopes: spotify.scopes.clone(),
            authorize_endpoint: spotify.authorize_endpoint.clone(),
            token_endpoint: spotify.token_endpoint.clone(),
            api_base: spotify.api_base.clone(),
            refresh_timeout: Duration::from_secs(spotify.refresh_timeout_secs),
        }
    }

    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.spotify.refresh_skew_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("chartify.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("chartify.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[spotify]\nclient_id = \"abc123\"\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.spotify.client_id, "abc123");
        assert_eq!(config.spotify.redirect_uri, "http://127.0.0.1:8888/callback");
        assert_eq!(config.spotify.scopes.len(), 4);
        assert_eq!(config.spotify.refresh_timeout_secs, 10);
        assert_eq!(config.refresh_skew(), Duration::from_secs(60));
        assert_eq!(config.storage.path, PathBuf::from("chartify-storage.json"));
        assert_eq!(config.charts.base_url, "https://wyniki.radio357.pl/api/charts");
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[spotify]
client_id = "abc123"
redirect_uri = "http://127.0.0.1:9999/done"
scopes = ["user-read-email"]
api_base = "http://localhost:3000/v1"
authorize_endpoint = "http://localhost:3000/authorize"
token_endpoint = "http://localhost:3000/api/token"
refresh_timeout_secs = 3
refresh_skew_secs = 0

[storage]
path = "/tmp/chartify/state.json"

[charts]
base_url = "http://localhost:4000/charts"
"#,
        );

        let config = Config::load(&path).unwrap();
        let oauth = config.oauth();
        assert_eq!(oauth.redirect_uri, "http://127.0.0.1:9999/done");
        assert_eq!(oauth.scopes, vec!["user-read-email"]);
        assert_eq!(oauth.refresh_timeout, Duration::from_secs(3));
        assert_eq!(oauth.api_url("me"), "http://localhost:3000/v1/me");
        assert_eq!(config.refresh_skew(), Duration::ZERO);
        assert_eq!(config.charts.base_url, "http://localhost:4000/charts");
    }

    #[test]
    fn test_load_missing_file_without_env_fails() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let result = Config::load(Path::new("/nonexistent/path/chartify.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_missing_file_with_env_client_id() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CLIENT_ID_ENV, "from-env") };
        let result = Config::load(Path::new("/nonexistent/path/chartify.toml"));
        unsafe { remove_env(CLIENT_ID_ENV) };

        let config = result.unwrap();
        assert_eq!(config.spotify.client_id, "from-env");
        assert_eq!(config.spotify.api_base, "https://api.spotify.com/v1");
    }

    #[test]
    fn test_env_client_id_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[spotify]\nclient_id = \"from-file\"\n");

        unsafe { set_env(CLIENT_ID_ENV, "  from-env  ") };
        let result = Config::load(&path);
        unsafe { remove_env(CLIENT_ID_ENV) };

        assert_eq!(result.unwrap().spotify.client_id, "from-env");
    }

    #[test]
    fn test_load_invalid_toml() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_empty_client_id_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[storage]\npath = \"state.json\"\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("client_id"), "got: {err}");
    }

    #[test]
    fn test_zero_refresh_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[spotify]\nclient_id = \"abc\"\nrefresh_timeout_secs = 0\n");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_non_http_chart_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[spotify]\nclient_id = \"abc\"\n\n[charts]\nbase_url = \"ftp://charts\"\n",
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("charts.base_url"), "got: {err}");
    }

    #[test]
    fn test_empty_scopes_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_ID_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[spotify]\nclient_id = \"abc\"\nscopes = []\n");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/etc/chartify/env.toml") };
        let cli = Config::resolve_path(Some(Path::new("/cli/chartify.toml")));
        let env = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        let default = Config::resolve_path(None);

        assert_eq!(cli, PathBuf::from("/cli/chartify.toml"));
        assert_eq!(env, PathBuf::from("/etc/chartify/env.toml"));
        assert_eq!(default, PathBuf::from("chartify.toml"));
    }
}
