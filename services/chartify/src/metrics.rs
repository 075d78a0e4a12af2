//! Prometheus recorder for the counters the library crates emit
//!
//! The libraries only talk to the `metrics` facade:
//! - `spotify_refresh_total{outcome}`
//! - `spotify_auth_retries_total`
//! - `immutable_cache_lookups_total{cache,result}`
//!
//! The binary installs the recorder once at startup. With `--metrics` the
//! snapshot is written to stderr in the Prometheus text format when the
//! command finishes.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide recorder and return the handle used to render it.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")
}

/// Write the current snapshot to stderr.
pub fn report(handle: &PrometheusHandle) {
    eprint!("{}", handle.render());
}
