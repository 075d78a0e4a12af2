//! Error types for chart retrieval

use crate::model::ChartKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("chart API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid chart response: {0}")]
    Decode(String),

    #[error("no published {0} charts")]
    NoCharts(ChartKind),

    #[error("unknown chart kind: {0} (expected weekly, top or top-pl)")]
    UnknownKind(String),
}

/// Result alias for chart operations.
pub type Result<T> = std::result::Result<T, Error>;
