//! Shared building blocks for the chartify workspace
//!
//! Holds the redacting `Secret` wrapper used for bearer and refresh tokens,
//! the `ArtistTitle` chart entry passed from the chart client to track
//! search, and the configuration-level error type shared by the binary.

mod error;
mod secret;
mod track;

pub use error::{Error, Result};
pub use secret::Secret;
pub use track::ArtistTitle;
