//! One-shot loopback listener for the OAuth redirect
//!
//! Binds the host and port of the configured redirect URI, serves exactly
//! one request on its path, and hands back the raw query string. The server
//! shuts down as soon as the query arrives or the wait times out.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

/// How long to wait for in-flight connections after the query arrives.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind the address the redirect URI points at.
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = Url::parse(redirect_uri)
            .with_context(|| format!("invalid redirect_uri: {redirect_uri}"))?;
        let host = url
            .host_str()
            .with_context(|| format!("redirect_uri has no host: {redirect_uri}"))?
            .to_owned();
        let port = url
            .port_or_known_default()
            .with_context(|| format!("redirect_uri has no port: {redirect_uri}"))?;

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("failed to bind callback listener on {host}:{port}"))?;
        debug!(addr = %listener.local_addr()?, path = url.path(), "callback listener bound");

        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the redirect arrives, returning its query string.
    pub async fn wait(self, timeout: Duration) -> Result<String> {
        let (query_tx, mut query_rx) = mpsc::channel::<String>(1);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route(&self.path, get(receive_redirect))
            .with_state(query_tx);

        let server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(timeout, query_rx.recv()).await;
        let _ = stop_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => debug!("callback listener stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "callback listener failed"),
            Ok(Err(e)) => warn!(error = %e, "callback listener task panicked"),
            Err(_) => warn!("callback listener did not stop in time"),
        }

        match outcome {
            Ok(Some(query)) => {
                info!("authorization redirect received");
                Ok(query)
            }
            Ok(None) => bail!("callback listener closed before the redirect arrived"),
            Err(_) => bail!(
                "no authorization redirect within {}s; run login again",
                timeout.as_secs()
            ),
        }
    }
}

async fn receive_redirect(
    State(query_tx): State<mpsc::Sender<String>>,
    RawQuery(query): RawQuery,
) -> Html<&'static str> {
    if query_tx.try_send(query.unwrap_or_default()).is_err() {
        debug!("redirect already received, ignoring repeat");
    }
    Html("<p>chartify received the authorization response. You can close this tab.</p>")
}
