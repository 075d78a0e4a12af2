//! Chart to track-list conversion
//!
//! Charts are published bottom-up, so the text form lists the lowest
//! position first. Parsing numbers the lines back so the last line is
//! position 1.

use common::ArtistTitle;

use crate::model::Chart;

/// Main chart entries as `"{artist} - {name}"`, lowest position first.
pub fn chart_lines(chart: &Chart) -> Vec<String> {
    chart
        .results
        .main_chart
        .items
        .iter()
        .rev()
        .map(|item| format!("{} - {}", item.artist, item.name))
        .collect()
}

/// Parse `artist - title` lines. Lines that do not split into exactly two
/// parts on `" - "` are skipped; positions count down from the number of
/// kept lines.
pub fn parse_track_lines(text: &str) -> Vec<ArtistTitle> {
    let pairs: Vec<(String, String)> = text
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(" - ").map(str::trim).collect();
            match parts.as_slice() {
                [artist, title] => Some((artist.to_string(), title.to_string())),
                _ => None,
            }
        })
        .collect();

    let count = pairs.len();
    pairs
        .into_iter()
        .enumerate()
        .map(|(index, (artist, title))| ArtistTitle::new(artist, title, count - index))
        .collect()
}

/// Search entries for a chart's main list.
pub fn track_entries(chart: &Chart) -> Vec<ArtistTitle> {
    parse_track_lines(&chart_lines(chart).join("\n"))
}

pub fn playlist_title(chart: &Chart) -> String {
    format!("{} #{}", chart.name, chart.no)
}

pub fn playlist_description(chart: &Chart) -> String {
    format!("{} | {}", chart.document, chart.published_at_date)
}
