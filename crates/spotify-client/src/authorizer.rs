//! Bearer authorization for outbound requests
//!
//! Every request goes through `RequestAuthorizer::execute`. Requests under
//! the configured API base get the current bearer token; anything else is
//! sent untouched. A 401/403 answer gets exactly one shared token renewal
//! and one retry, so a burst of requests that all discover a dead token at
//! once produces a single call to the token endpoint.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use spotify_auth::{TokenManager, now_millis};
use tracing::{debug, info, warn};

use crate::classify::is_auth_rejection;
use crate::error::{Error, Result};

/// Renew tokens this long before they expire.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(60);

pub struct RequestAuthorizer {
    tokens: Arc<TokenManager>,
    http: reqwest::Client,
    refresh_skew: Duration,
}

impl RequestAuthorizer {
    pub fn new(tokens: Arc<TokenManager>, http: reqwest::Client) -> Self {
        Self {
            tokens,
            http,
            refresh_skew: DEFAULT_REFRESH_SKEW,
        }
    }

    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Client for building requests to pass to `execute`.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a request, authorizing it if it targets the API.
    ///
    /// Non-auth failures come back as ordinary responses. A rejection that
    /// survives the one renewal, or a failed renewal after a rejection, is
    /// `AuthRejected`. A failed renewal ahead of an expiring token is `Auth`
    /// and the request is not sent.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        if !is_under_base(request.url().as_str(), &self.tokens.config().api_base) {
            debug!(url = %request.url(), "request outside API base, sending as is");
            return self.send(request).await;
        }

        let Some(record) = self.tokens.state().await.record().cloned() else {
            debug!(url = %request.url(), "no session, sending unauthenticated");
            return self.send(request).await;
        };

        // Early renewal only for sessions that can renew; a token without a
        // refresh token is used until the API rejects it.
        let mut token = Secret::new(record.access_token.clone());
        if record.refresh_token.is_some() && record.expires_within(self.refresh_skew, now_millis()) {
            debug!("access token close to expiry, renewing before request");
            token = self
                .tokens
                .refresh_shared(Some(token.expose()))
                .await
                .map_err(|e| {
                    warn!(error = %e, "proactive token renewal failed");
                    Error::Auth(e)
                })?;
        }

        let replay = request.try_clone();
        let response = self.send(with_bearer(request, &token)?).await?;
        let status = response.status();
        if !is_auth_rejection(status) {
            return Ok(response);
        }

        let Some(replay) = replay else {
            warn!(status = status.as_u16(), "request body cannot be replayed, not retrying");
            return Err(Error::AuthRejected {
                status: status.as_u16(),
                reason: "request body cannot be replayed".into(),
            });
        };

        info!(status = status.as_u16(), url = %replay.url(), "request rejected, renewing token");
        metrics::counter!("spotify_auth_retries_total").increment(1);

        let renewed = match self.tokens.refresh_shared(Some(token.expose())).await {
            Ok(renewed) => renewed,
            Err(e) => {
                return Err(Error::AuthRejected {
                    status: status.as_u16(),
                    reason: e.to_string(),
                });
            }
        };

        let response = self.send(with_bearer(replay, &renewed)?).await?;
        let retry_status = response.status();
        if is_auth_rejection(retry_status) {
            warn!(status = retry_status.as_u16(), "request rejected again after renewal");
            return Err(Error::AuthRejected {
                status: retry_status.as_u16(),
                reason: "rejected again after token renewal".into(),
            });
        }
        Ok(response)
    }

    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        self.http
            .execute(request)
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }
}

/// Prefix match on a path boundary: `.../v1` covers `.../v1/me` and
/// `.../v1?x`, not `.../v1beta`.
fn is_under_base(url: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    match url.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?']),
        None => false,
    }
}

fn with_bearer(mut request: reqwest::Request, token: &Secret<String>) -> Result<reqwest::Request> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
        .map_err(|e| Error::Http(format!("access token is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{authorizer, manager, token_body};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn base_prefix_respects_path_boundary() {
        let base = "https://api.spotify.com/v1";
        assert!(is_under_base("https://api.spotify.com/v1/me", base));
        assert!(is_under_base("https://api.spotify.com/v1", base));
        assert!(is_under_base("https://api.spotify.com/v1?market=PL", base));
        assert!(is_under_base("https://api.spotify.com/v1/me", "https://api.spotify.com/v1/"));
        assert!(!is_under_base("https://api.spotify.com/v1beta/me", base));
        assert!(!is_under_base("https://wyniki.radio357.pl/api/charts", base));
    }

    #[tokio::test]
    async fn passes_through_requests_outside_api_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/charts/lista/all"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, Some(("BQD", Some("R1")))));
        let request = authorizer
            .http()
            .get(format!("{}/charts/lista/all", server.uri()))
            .build()
            .unwrap();
        let response = authorizer.execute(request).await.unwrap();
        assert_eq!(response.status(), 200);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn sends_unauthenticated_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/browse/new-releases"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, None));
        let request = authorizer
            .http()
            .get(format!("{}/v1/browse/new-releases", server.uri()))
            .build()
            .unwrap();
        let response = authorizer.execute(request).await.unwrap();
        assert_eq!(response.status(), 401);

        let received = server.received_requests().await.unwrap();
        assert!(!received[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .and(header("authorization", "Bearer BQD"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, Some(("BQD", Some("R1")))));
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        assert_eq!(authorizer.execute(request).await.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn other_failures_are_returned_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(0)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, Some(("BQD", Some("R1")))));
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        assert_eq!(authorizer.execute(request).await.unwrap().status(), 503);
    }

    async fn mount_stale_then_fresh(server: &MockServer, rejection: u16) {
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(rejection))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn retries_once_after_unauthorized() {
        let server = MockServer::start().await;
        mount_stale_then_fresh(&server, 401).await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, Some(("stale", Some("R1")))));
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        assert_eq!(authorizer.execute(request).await.unwrap().status(), 200);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn retries_once_after_forbidden() {
        let server = MockServer::start().await;
        mount_stale_then_fresh(&server, 403).await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, Some(("stale", Some("R1")))));
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        assert_eq!(authorizer.execute(request).await.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn second_rejection_is_final() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, Some(("stale", Some("R1")))));
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        let err = authorizer.execute(request).await.unwrap_err();
        assert!(matches!(err, Error::AuthRejected { status: 401, .. }), "got: {err}");
    }

    #[tokio::test]
    async fn failed_renewal_is_auth_rejected_with_original_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server, Some(("stale", Some("R1"))));
        let authorizer = authorizer(tokens.clone());
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        let err = authorizer.execute(request).await.unwrap_err();
        assert!(matches!(err, Error::AuthRejected { status: 403, .. }), "got: {err}");
        assert!(err.requires_login());
        assert!(!tokens.is_authenticated().await);
    }

    #[tokio::test]
    async fn rejection_without_refresh_token_is_auth_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = authorizer(manager(&server, Some(("stale", None))));
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        let err = authorizer.execute(request).await.unwrap_err();
        assert!(matches!(err, Error::AuthRejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn concurrent_rejections_share_one_renewal() {
        let server = MockServer::start().await;
        mount_stale_then_fresh(&server, 401).await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("fresh"))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let authorizer = Arc::new(authorizer(manager(&server, Some(("stale", Some("R1"))))));
        let url = format!("{}/v1/me/playlists", server.uri());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let authorizer = authorizer.clone();
                let url = url.clone();
                tokio::spawn(async move {
                    let request = authorizer.http().get(url).build().unwrap();
                    authorizer.execute(request).await
                })
            })
            .collect();

        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.status(), 200);
        }
    }

    #[tokio::test]
    async fn renews_expiring_token_before_sending() {
        let server = MockServer::start().await;
        mount_stale_then_fresh(&server, 401).await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = crate::testing::manager_with_expiry(&server, "stale", Some("R1"), Some(1));
        let authorizer = authorizer(tokens);
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        assert_eq!(authorizer.execute(request).await.unwrap().status(), 200);

        let received = server.received_requests().await.unwrap();
        let stale_sent = received.iter().any(|r| {
            r.headers
                .get("authorization")
                .is_some_and(|v| v.as_bytes() == b"Bearer stale")
        });
        assert!(!stale_sent, "expired token should never be sent");
    }

    #[tokio::test]
    async fn expiring_token_without_refresh_token_is_still_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .and(header("authorization", "Bearer soon"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(0)
            .mount(&server)
            .await;

        let tokens =
            crate::testing::manager_with_expiry(&server, "soon", None, Some(now_millis() + 30_000));
        let authorizer = authorizer(tokens.clone());
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        assert_eq!(authorizer.execute(request).await.unwrap().status(), 200);
        assert!(tokens.is_authenticated().await);
    }

    #[tokio::test]
    async fn failed_early_renewal_does_not_send_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/playlists"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = crate::testing::manager_with_expiry(&server, "stale", Some("R1"), Some(1));
        let authorizer = authorizer(tokens.clone());
        let request = authorizer
            .http()
            .get(format!("{}/v1/me/playlists", server.uri()))
            .build()
            .unwrap();
        let err = authorizer.execute(request).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)), "got: {err}");
        assert!(err.requires_login());
        assert!(!tokens.is_authenticated().await);
    }
}
