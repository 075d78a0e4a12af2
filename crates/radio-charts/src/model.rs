//! Chart API payloads
//!
//! Chart numbers arrive as strings in some responses and as numbers in
//! others, so they are read through a lenient deserializer.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which chart list to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    /// The weekly "Lista"
    #[default]
    Weekly,
    Top,
    /// Polish-only top list
    TopPl,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Weekly, ChartKind::Top, ChartKind::TopPl];

    /// Path segment in the chart API.
    pub fn segment(&self) -> &'static str {
        match self {
            ChartKind::Weekly => "lista",
            ChartKind::Top => "top",
            ChartKind::TopPl => "top-pl",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Weekly => "weekly",
            ChartKind::Top => "top",
            ChartKind::TopPl => "top-pl",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChartKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "lista" => Ok(ChartKind::Weekly),
            "top" => Ok(ChartKind::Top),
            "top-pl" | "toppl" => Ok(ChartKind::TopPl),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}

/// Entry in the `/{segment}/all` listing, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSummary {
    #[serde(deserialize_with = "number")]
    pub no: u32,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub published_at_date: Option<String>,
}

/// One published chart. Never changes once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(deserialize_with = "number")]
    pub no: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_template: String,
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub published_at_date: String,
    #[serde(default, deserialize_with = "optional_number")]
    pub previous_no: Option<u32>,
    #[serde(default, deserialize_with = "optional_number")]
    pub next_no: Option<u32>,
    #[serde(default)]
    pub summary: Option<ChartStats>,
    #[serde(default)]
    pub results: ChartResults,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartStats {
    #[serde(default)]
    pub new: u32,
    #[serde(default)]
    pub up: u32,
    #[serde(default)]
    pub down: u32,
    #[serde(default)]
    pub same: u32,
    #[serde(default)]
    pub max_times_on_chart: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartResults {
    #[serde(rename = "mainChart", default)]
    pub main_chart: ItemList,
    #[serde(rename = "waitingRoom", default)]
    pub waiting_room: WaitingRoom,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub items: Vec<ChartItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitingRoom {
    #[serde(default)]
    pub items: Vec<ChartItem>,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartItem {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub last_position: Option<u32>,
    #[serde(default)]
    pub times_on_chart: u32,
    #[serde(default)]
    pub change: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => u32::try_from(n).map_err(de::Error::custom),
        NumberOrText::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn optional_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => u32::try_from(n).map(Some).map_err(de::Error::custom),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
    }
}
