//! Radio 357 chart retrieval
//!
//! Reads the published weekly, top and Polish top charts and turns them into
//! track lists ready for searching. Published charts are immutable, so every
//! chart fetched by number is kept for the life of the process.

pub mod cache;
pub mod client;
pub mod error;
pub mod model;
pub mod tracklist;

pub use cache::ImmutableCache;
pub use client::{ChartClient, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use model::{Chart, ChartItem, ChartKind, ChartSummary};
pub use tracklist::{chart_lines, parse_track_lines, playlist_description, playlist_title, track_entries};
