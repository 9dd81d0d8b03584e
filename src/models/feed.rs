// src/models/feed.rs

//! Output document structures written by the storage layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::EventRecord;

/// Canonical feed (`events.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedDocument {
    pub generated_at: DateTime<Utc>,
    pub total_events: usize,
    pub events: Vec<EventRecord>,
}

impl FeedDocument {
    pub fn new(events: Vec<EventRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            total_events: events.len(),
            events,
        }
    }
}

/// Canonical feed plus statistics (`events_full.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullFeedDocument {
    pub generated_at: DateTime<Utc>,
    pub total_events: usize,
    pub statistics: Statistics,
    pub events: Vec<EventRecord>,
}

impl FullFeedDocument {
    pub fn new(events: Vec<EventRecord>, statistics: Statistics) -> Self {
        Self {
            generated_at: Utc::now(),
            total_events: events.len(),
            statistics,
            events,
        }
    }
}

/// Summary counts over the current record set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Statistics {
    pub total_events: usize,
    pub sources: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    pub age_groups: BTreeMap<String, usize>,
    pub date_range: DateRange,
}

/// Earliest and latest event dates; both absent for an empty set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
}

/// Compact page metadata (`metadata.json`) covering the next seven days.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub generated_at: DateTime<Utc>,
    pub total_events: usize,
    pub total_venues: usize,
    pub date_range: MetadataRange,
    pub human_readable: HumanReadable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HumanReadable {
    pub events: String,
    pub venues: String,
    pub date_generated: String,
}

/// One weekly shard (`events_weekN.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekShard {
    pub generated_at: DateTime<Utc>,
    pub total_events: usize,
    /// Display label, e.g. "Week 1"
    pub week: String,
    /// First date included (inclusive)
    pub start: String,
    /// Window end (exclusive)
    pub end: String,
    pub events: Vec<EventRecord>,
}
