use std::fmt;

/// One chart entry reduced to what a track search needs.
///
/// `position` is the 1-based chart position, counted from the top.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtistTitle {
    pub artist: String,
    pub title: String,
    pub position: usize,
}

impl ArtistTitle {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, position: usize) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            position,
        }
    }

    /// Free-text query for a track search.
    pub fn query(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

impl fmt::Display for ArtistTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} - {}", self.position, self.artist, self.title)
    }
}
