//! Token lifecycle state machine
//!
//! `TokenManager` owns the only mutable session state in the process: the
//! current token record and whether a refresh is outstanding. Everything
//! that needs a bearer token asks the manager; nothing else touches storage.
//!
//! States:
//! - `LoggedOut` → `Authenticated` (code exchange succeeded)
//! - `Authenticated` → `Refreshing` (refresh started)
//! - `Refreshing` → `Authenticated` (refresh succeeded)
//! - `Refreshing` → `LoggedOut` (refresh failed; storage cleared)
//! - any → `LoggedOut` (logout)
//!
//! Concurrent callers that all discover a dead token share one refresh via
//! `refresh_shared`: the first caller starts it on a detached task, the rest
//! subscribe to a `watch` channel and receive the same outcome. The task runs
//! to completion even if every caller goes away, so shared state is always
//! settled and no waiter is left hanging.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use reqwest::StatusCode;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

use crate::config::OAuthConfig;
use crate::credentials::{CredentialStore, PkceSession, TokenRecord, now_millis};
use crate::error::{Error, Result};
use crate::pkce::{PkcePair, build_authorization_url};
use crate::profile::UserProfile;
use crate::storage::KeyValueStore;
use crate::token;

/// Session state.
#[derive(Debug, Clone)]
pub enum TokenState {
    LoggedOut,
    Authenticated(TokenRecord),
    /// A refresh is outstanding. The stale record stays readable so requests
    /// already holding it can still be matched against the renewed token.
    Refreshing(TokenRecord),
}

impl TokenState {
    pub fn label(&self) -> &'static str {
        match self {
            TokenState::LoggedOut => "logged_out",
            TokenState::Authenticated(_) => "authenticated",
            TokenState::Refreshing(_) => "refreshing",
        }
    }

    pub fn record(&self) -> Option<&TokenRecord> {
        match self {
            TokenState::LoggedOut => None,
            TokenState::Authenticated(record) | TokenState::Refreshing(record) => Some(record),
        }
    }
}

/// What a shared refresh resolves to, broadcast to every waiter.
type RefreshOutcome = Result<Secret<String>>;

pub struct TokenManager {
    config: OAuthConfig,
    http: reqwest::Client,
    credentials: CredentialStore,
    pkce: PkceSession,
    state: RwLock<TokenState>,
    /// Receiver for the refresh in flight, if any. Check-then-start happens
    /// under this lock so at most one refresh runs at a time.
    refresh_slot: Mutex<Option<watch::Receiver<Option<RefreshOutcome>>>>,
}

impl TokenManager {
    /// Create a manager, restoring the session from storage if a valid
    /// record is there.
    pub fn new(config: OAuthConfig, http: reqwest::Client, storage: Arc<dyn KeyValueStore>) -> Self {
        let credentials = CredentialStore::new(storage.clone());
        let pkce = PkceSession::new(storage);

        let state = match credentials.load() {
            Some(record) => {
                info!("restored session from storage");
                TokenState::Authenticated(record)
            }
            None => {
                debug!("no stored session");
                TokenState::LoggedOut
            }
        };

        Self {
            config,
            http,
            credentials,
            pkce,
            state: RwLock::new(state),
            refresh_slot: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub async fn state(&self) -> TokenState {
        self.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.record().is_some()
    }

    /// Current bearer token, if there is a session.
    pub async fn access_token(&self) -> Option<Secret<String>> {
        self.state
            .read()
            .await
            .record()
            .map(|record| Secret::new(record.access_token.clone()))
    }

    /// Whether the current token is known to expire within `skew`.
    pub async fn token_expiring(&self, skew: Duration) -> bool {
        self.state
            .read()
            .await
            .record()
            .is_some_and(|record| record.expires_within(skew, now_millis()))
    }

    /// Start a login: persist a fresh PKCE verifier and return the
    /// authorization URL the user agent should be sent to.
    ///
    /// `return_to` is carried through the flow as `state` and handed back by
    /// `handle_callback`. Token state is not touched.
    pub fn login(&self, return_to: &str) -> Result<String> {
        let pair = PkcePair::generate();
        self.pkce.save(&pair.verifier)?;
        let url = build_authorization_url(&self.config, return_to, &pair.challenge)?;
        info!(return_to, "login started");
        Ok(url)
    }

    /// Complete a login with the authorization code from the redirect.
    ///
    /// Returns `state` (the path to return the user to) on success. The
    /// stored verifier is consumed whatever the outcome, since the code it
    /// pairs with is single-use.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<String> {
        let verifier = self.pkce.load().ok_or(Error::MissingVerifier)?;
        if let Err(e) = self.pkce.clear() {
            warn!(error = %e, "failed to clear PKCE verifier");
        }

        let response = match token::exchange_code(&self.http, &self.config, code, &verifier).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "authorization code exchange failed");
                return Err(e);
            }
        };

        let record = TokenRecord::from_response(response, now_millis());
        self.credentials.save(&record)?;
        *self.state.write().await = TokenState::Authenticated(record);
        info!(return_to = state, "authorization code exchanged, session authenticated");
        Ok(state.to_string())
    }

    /// Handle the raw redirect query (`code=...&state=...` or `error=...`).
    ///
    /// A redirect without a code (user came back some other way) is not an
    /// error: it returns the requested path, defaulting to `/`.
    pub async fn handle_redirect(&self, query: &str) -> Result<String> {
        let mut code = None;
        let mut state = None;
        let mut denied = None;
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => denied = Some(value.into_owned()),
                _ => {}
            }
        }

        let return_to = state
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/".to_string());

        if let Some(reason) = denied {
            warn!(reason = %reason, "authorization denied by user or server");
            if let Err(e) = self.pkce.clear() {
                warn!(error = %e, "failed to clear PKCE verifier");
            }
            return Err(Error::AuthorizationDenied(reason));
        }

        match code {
            Some(code) => self.handle_callback(&code, &return_to).await,
            None => Ok(return_to),
        }
    }

    /// Renew the access token with the stored refresh token.
    ///
    /// A missing refresh token is terminal (`NoRefreshToken`). Any failure of
    /// the refresh call itself ends the session: state goes to `LoggedOut`
    /// and storage is cleared. Never retried.
    ///
    /// The outcome is committed only if the session is still the one the
    /// refresh started from. If it was logged out or replaced by a new login
    /// in the meantime, the response is dropped, the newer state is left
    /// alone and `Unauthenticated` is returned.
    pub async fn refresh(&self) -> Result<TokenRecord> {
        let current = {
            let mut state = self.state.write().await;
            let record = state.record().cloned().ok_or(Error::NoRefreshToken)?;
            if record.refresh_token.is_none() {
                return Err(Error::NoRefreshToken);
            }
            *state = TokenState::Refreshing(record.clone());
            record
        };
        let refresh = current.refresh_token.as_deref().unwrap_or_default();
        let result = token::refresh_token(&self.http, &self.config, refresh).await;

        let mut state = self.state.write().await;
        if !still_refreshing(&state, &current) {
            match &result {
                Ok(_) => info!("session ended during refresh, discarding renewed token"),
                Err(e) => info!(error = %e, "session ended during refresh"),
            }
            return Err(Error::Unauthenticated);
        }

        match result {
            Ok(response) => {
                let renewed = current.renewed(response, now_millis());
                if let Err(e) = self.credentials.save(&renewed) {
                    warn!(error = %e, "failed to persist refreshed token");
                }
                *state = TokenState::Authenticated(renewed.clone());
                info!("access token refreshed");
                Ok(renewed)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                *state = TokenState::LoggedOut;
                if let Err(clear_err) = self.credentials.clear().and(self.pkce.clear()) {
                    warn!(error = %clear_err, "failed to clear stored session");
                }
                Err(e)
            }
        }
    }

    /// Refresh once on behalf of every concurrent caller.
    ///
    /// `stale` is the token the caller saw rejected. If the current token
    /// already differs, an earlier refresh has renewed it and it is returned
    /// without another call. Otherwise the caller joins the refresh in
    /// flight, or starts one. On failure the session is logged out.
    pub async fn refresh_shared(self: &Arc<Self>, stale: Option<&str>) -> RefreshOutcome {
        let mut rx = {
            let mut slot = self.refresh_slot.lock().await;
            match slot.as_ref() {
                Some(rx) => {
                    debug!("joining refresh already in flight");
                    rx.clone()
                }
                None => {
                    if let Some(stale) = stale
                        && let Some(current) = self.access_token().await
                        && current.expose() != stale
                    {
                        debug!("token already renewed, skipping refresh");
                        return Ok(current);
                    }

                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx.clone());
                    let manager = Arc::clone(self);
                    tokio::spawn(async move { manager.drive_shared_refresh(tx).await });
                    rx
                }
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(Error::RefreshFailed(
                "refresh ended without a result".into(),
            ))
        })
    }

    /// Body of the detached refresh task: run it, settle state, clear the
    /// slot and broadcast, in that order, so a caller arriving after the
    /// slot is cleared already sees the renewed token.
    async fn drive_shared_refresh(&self, tx: watch::Sender<Option<RefreshOutcome>>) {
        let outcome = match self.refresh().await {
            Ok(record) => {
                metrics::counter!("spotify_refresh_total", "outcome" => "renewed").increment(1);
                Ok(Secret::new(record.access_token))
            }
            Err(e) => {
                metrics::counter!("spotify_refresh_total", "outcome" => "failed").increment(1);
                // A failed call already ended its own session; a session that
                // cannot be refreshed at all ends here.
                if matches!(e, Error::NoRefreshToken)
                    && let Err(logout_err) = self.logout().await
                {
                    warn!(error = %logout_err, "logout after failed refresh was incomplete");
                }
                Err(e)
            }
        };

        let mut slot = self.refresh_slot.lock().await;
        *slot = None;
        tx.send_replace(Some(outcome));
    }

    /// End the session: clear the token record and any pending PKCE
    /// verifier. Idempotent.
    pub async fn logout(&self) -> Result<()> {
        let was = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, TokenState::LoggedOut)
        };
        let token_cleared = self.credentials.clear();
        let verifier_cleared = self.pkce.clear();
        if was.record().is_some() {
            info!("logged out");
        }
        token_cleared.and(verifier_cleared)
    }

    /// Fetch the current user's profile.
    ///
    /// A 401 triggers one shared refresh and one retry; whatever the retry
    /// returns is final.
    pub async fn get_profile(self: &Arc<Self>) -> Result<UserProfile> {
        let token = self.access_token().await.ok_or(Error::Unauthenticated)?;
        let response = self.send_profile_request(&token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode_profile(response).await;
        }

        info!("profile request unauthorized, renewing token once");
        let renewed = self.refresh_shared(Some(token.expose())).await?;
        let retry = self.send_profile_request(&renewed).await?;
        decode_profile(retry).await
    }

    async fn send_profile_request(&self, token: &Secret<String>) -> Result<reqwest::Response> {
        self.http
            .get(self.config.api_url("me"))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| Error::Http(format!("profile request failed: {e}")))
    }
}

/// Whether `state` is still the refresh that started from `current`.
fn still_refreshing(state: &TokenState, current: &TokenRecord) -> bool {
    matches!(state, TokenState::Refreshing(record) if record.access_token == current.access_token)
}

async fn decode_profile(response: reqwest::Response) -> Result<UserProfile> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<UserProfile>()
        .await
        .map_err(|e| Error::Http(format!("invalid profile response: {e}")))
}
