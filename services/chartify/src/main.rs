//! chartify
//!
//! Command-line tool that:
//! 1. Logs in to Spotify with the PKCE authorization code flow
//! 2. Reads the published Radio 357 charts
//! 3. Searches Spotify for every chart entry
//! 4. Publishes the result as a playlist on the user's account

mod app;
mod callback;
mod cli;
mod config;
mod metrics;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use spotify_auth::now_millis;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;
use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config_path = Config::resolve_path(cli.config.as_deref());
    debug!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        storage = %config.storage.path.display(),
        api_base = %config.spotify.api_base,
        charts = %config.charts.base_url,
        "configuration loaded"
    );

    let prometheus = metrics::install_recorder()?;
    let app = App::new(&config)?;
    let result = run(&app, cli.command).await;
    if cli.metrics {
        metrics::report(&prometheus);
    }
    result
}

/// Log filter from LOG_LEVEL, then RUST_LOG, then `info`. Logs go to stderr
/// so command output on stdout stays clean.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Login {
            return_to,
            timeout_secs,
        } => {
            let back_to = app
                .login(&return_to, Duration::from_secs(timeout_secs))
                .await?;
            println!("Logged in. Continue at {back_to}");
        }

        Command::Logout => {
            app.tokens.logout().await.context("logout incomplete")?;
            println!("Logged out.");
        }

        Command::Status => {
            let state = app.tokens.state().await;
            println!("session: {}", state.label());
            if let Some(record) = state.record() {
                if let Some(expires_at) = record.expires_at {
                    println!("expires: {}", describe_expiry(expires_at, now_millis()));
                }
                println!("refresh token: {}", if record.refresh_token.is_some() { "stored" } else { "none" });
                println!("scope: {}", record.scope);
            }
        }

        Command::Profile => {
            let profile = app.api.profile().await.context("failed to fetch profile")?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }

        Command::Summaries { kind } => {
            let summaries = app
                .charts
                .summaries(kind)
                .await
                .with_context(|| format!("failed to list {kind} charts"))?;
            for summary in summaries {
                let date = summary.published_at_date.as_deref().unwrap_or("-");
                println!("{:>5}  {date}", summary.no);
            }
        }

        Command::Chart { kind, number } => {
            let chart = app.chart(kind, number).await?;
            println!("{}", radio_charts::playlist_title(&chart));
            println!("{}", radio_charts::playlist_description(&chart));
            println!();
            for line in radio_charts::chart_lines(&chart) {
                println!("{line}");
            }
        }

        Command::Playlist {
            kind,
            number,
            private,
            dry_run,
        } => {
            let plan = app.plan_playlist(kind, number).await?;
            println!("{}: {} of {} tracks found", plan.title, plan.uris().len(), plan.matches.len());
            for entry in plan.missing() {
                println!("  not found: {entry}");
            }

            if dry_run {
                info!(title = %plan.title, "dry run, playlist not created");
                return Ok(());
            }

            let playlist = app.publish_playlist(&plan, !private).await?;
            match playlist.external_urls.spotify {
                Some(url) => println!("Created {} ({url})", playlist.name),
                None => println!("Created {} ({})", playlist.name, playlist.id),
            }
        }
    }
    Ok(())
}

fn describe_expiry(expires_at: u64, now: u64) -> String {
    if expires_at <= now {
        let ago = (now - expires_at) / 1000;
        format!("expired {ago}s ago (renewed on next request)")
    } else {
        let left = (expires_at - now) / 1000;
        format!("in {left}s")
    }
}
