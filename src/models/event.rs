// src/models/event.rs

//! Event and venue data structures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Age group label applied when a collector leaves `age_groups` empty.
pub const ALL_AGES: &str = "All Ages";

/// One occurrence of an activity, as produced by a collector.
///
/// Required fields (`title`, `date`, `start_time`, `venue`) are optional here
/// so incomplete collector output survives until validation drops it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventRecord {
    /// Fingerprint; computed by the aggregator when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub title: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    /// ISO `YYYY-MM-DD`
    pub date: Option<String>,

    /// Zero-padded `HH:MM`, 24-hour
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,

    pub venue: Option<Venue>,

    #[serde(default)]
    pub age_groups: Vec<String>,

    #[serde(default)]
    pub indoor_outdoor: Option<Setting>,

    #[serde(default)]
    pub organized_by: Option<String>,

    #[serde(default)]
    pub website: Option<String>,

    /// Collector identifier, always overwritten by the aggregator
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub is_free: FreeStatus,

    /// Collector-specific fields passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventRecord {
    /// Compute the dedup fingerprint for this record.
    ///
    /// Missing parts contribute an empty string.
    pub fn fingerprint(&self) -> String {
        fingerprint(
            self.title.as_deref().unwrap_or(""),
            self.date.as_deref().unwrap_or(""),
            self.start_time.as_deref().unwrap_or(""),
            self.venue.as_ref().map_or("", |v| v.name.as_str()),
        )
    }

    /// The `(date, start_time)` pair used for ordering.
    pub fn sort_key(&self) -> (&str, &str) {
        (
            self.date.as_deref().unwrap_or(""),
            self.start_time.as_deref().unwrap_or(""),
        )
    }

    /// Venue name if present and non-empty.
    pub fn venue_name(&self) -> Option<&str> {
        self.venue
            .as_ref()
            .map(|v| v.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Deterministic hash of `lower(title)|date|start_time|lower(venue_name)`.
pub fn fingerprint(title: &str, date: &str, start_time: &str, venue_name: &str) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        title.to_lowercase(),
        date,
        start_time,
        venue_name.to_lowercase()
    );
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Physical location of an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Venue {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub neighborhood: String,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lng: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

impl Venue {
    /// Both coordinates are known.
    pub fn has_coordinates(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// Whether an event happens inside, outside, or both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Setting {
    #[default]
    Indoor,
    Outdoor,
    Both,
}

/// Tri-state admission flag.
///
/// On the wire this is `true`, `false` or `null`; a missing key reads as
/// `Unknown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum FreeStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl From<Option<bool>> for FreeStatus {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => FreeStatus::True,
            Some(false) => FreeStatus::False,
            None => FreeStatus::Unknown,
        }
    }
}

impl From<FreeStatus> for Option<bool> {
    fn from(value: FreeStatus) -> Self {
        match value {
            FreeStatus::True => Some(true),
            FreeStatus::False => Some(false),
            FreeStatus::Unknown => None,
        }
    }
}
