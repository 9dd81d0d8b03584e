// src/pipeline/aggregate.rs

//! Event aggregation: dedup, validation, enrichment, ordering, statistics.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{ALL_AGES, DateRange, EventRecord, GeocodingConfig, Setting, Statistics};
use crate::services::{Coordinates, Enrichment, Geocoder};
use crate::utils::{format_date, normalize_time, parse_date};

pub const DEFAULT_CATEGORY: &str = "Entertainment";
pub const DEFAULT_ICON: &str = "🎉";
pub const DEFAULT_ORGANIZER: &str = "Community Event";

const UNKNOWN: &str = "Unknown";

/// Outcome of one `add_events` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddReport {
    pub added: usize,
    pub duplicates: usize,
}

/// Outcome of `validate_events`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub kept: usize,
    pub dropped: usize,
}

/// Outcome of `enrich_with_place_ids`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Venues sent to the enrichment port
    pub attempted: usize,
    /// Venues that came back with a place id
    pub enriched: usize,
}

/// Outcome of `geocode_venues`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeReport {
    /// Venues with missing or placeholder coordinates
    pub suspect: usize,
    pub fixed: usize,
}

/// In-run working set of events.
#[derive(Debug)]
pub struct Aggregator {
    events: Vec<EventRecord>,
    seen: HashSet<String>,
    today: NaiveDate,
}

impl Aggregator {
    /// `today` is the run date used by `filter_past_events`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            events: Vec::new(),
            seen: HashSet::new(),
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn into_events(self) -> Vec<EventRecord> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Stamp `source`, assign ids and keep the first record per fingerprint.
    ///
    /// Key fields are put in their output form first, so the fingerprint
    /// matches what validation later emits.
    pub fn add_events(&mut self, events: Vec<EventRecord>, source: &str) -> AddReport {
        let mut report = AddReport::default();

        for mut event in events {
            event.source = source.to_string();
            normalize_key_fields(&mut event);

            let fingerprint = event.fingerprint();
            if event.id.as_deref().is_none_or(str::is_empty) {
                event.id = Some(fingerprint.clone());
            }

            if self.seen.insert(fingerprint) {
                self.events.push(event);
                report.added += 1;
            } else {
                report.duplicates += 1;
            }
        }

        log::info!("Added {} events from {}", report.added, source);
        if report.duplicates > 0 {
            log::info!("Skipped {} duplicates from {}", report.duplicates, source);
        }
        report
    }

    /// Drop events dated before today. Returns the number removed.
    ///
    /// Undated or unparseable events are left for validation.
    pub fn filter_past_events(&mut self) -> usize {
        let today = self.today;
        let before = self.events.len();

        self.events.retain(|event| {
            match event.date.as_deref().and_then(parse_date) {
                Some(date) => date >= today,
                None => true,
            }
        });

        let removed = before - self.events.len();
        if removed > 0 {
            log::info!("Removed {} past events", removed);
        }
        removed
    }

    /// Drop incomplete records and fill display defaults.
    ///
    /// Running this twice changes nothing the second time.
    pub fn validate_events(&mut self) -> ValidationReport {
        let before = self.events.len();
        let events = std::mem::take(&mut self.events);

        for event in events {
            match normalize_event(event) {
                Ok(event) => self.events.push(event),
                Err((title, reason)) => {
                    log::warn!("Skipping invalid event '{}': {}", title, reason);
                }
            }
        }

        let report = ValidationReport {
            kept: self.events.len(),
            dropped: before - self.events.len(),
        };
        if report.dropped > 0 {
            log::warn!("Skipped {} invalid events", report.dropped);
        }
        report
    }

    /// Replace missing or placeholder venue coordinates with geocoded ones.
    pub async fn geocode_venues(
        &mut self,
        geocoder: &mut Geocoder,
        config: &GeocodingConfig,
    ) -> GeocodeReport {
        let placeholder = Coordinates::new(config.placeholder_lat, config.placeholder_lng);
        let tolerance = config.placeholder_tolerance;
        let mut report = GeocodeReport::default();

        for event in &mut self.events {
            let Some(venue) = event.venue.as_mut() else {
                continue;
            };

            let suspect = match (venue.lat, venue.lng) {
                (Some(lat), Some(lng)) => Coordinates::new(lat, lng).is_near(placeholder, tolerance),
                _ => true,
            };
            if !suspect || venue.address.trim().is_empty() {
                continue;
            }
            report.suspect += 1;

            if let Some(found) = geocoder.geocode(&venue.address).await {
                if !found.is_near(placeholder, tolerance) {
                    venue.lat = Some(found.lat);
                    venue.lng = Some(found.lng);
                    report.fixed += 1;
                }
            }
        }

        log::info!(
            "Geocoded {} of {} venues with missing or placeholder coordinates",
            report.fixed,
            report.suspect
        );
        log::info!("Geocoder: {}", geocoder.stats());
        report
    }

    /// Resolve place ids for venues that lack one.
    pub async fn enrich_with_place_ids(&mut self, enrichment: &mut dyn Enrichment) -> EnrichReport {
        let mut report = EnrichReport::default();

        for event in &mut self.events {
            let Some(venue) = event.venue.as_mut() else {
                continue;
            };
            if venue.place_id.is_some() {
                continue;
            }

            report.attempted += 1;
            if enrichment.enrich_venue(venue).await.is_some() {
                report.enriched += 1;
            }
        }

        let with_place_id = self
            .events
            .iter()
            .filter(|e| e.venue.as_ref().is_some_and(|v| v.place_id.is_some()))
            .count();

        log::info!("Enriched {} venues with place ids", report.enriched);
        log::info!("{} of {} events have a place id", with_place_id, self.events.len());
        log::info!("Place lookup: {}", enrichment.stats());
        report
    }

    /// Stable sort by `(date, start_time)`.
    pub fn sort_events(&mut self) {
        self.events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// Counts by source, category and age group plus the date range.
    pub fn get_statistics(&self) -> Statistics {
        statistics(&self.events)
    }
}

/// Statistics over any event slice.
pub fn statistics(events: &[EventRecord]) -> Statistics {
    let mut stats = Statistics {
        total_events: events.len(),
        ..Statistics::default()
    };

    for event in events {
        let source = if event.source.is_empty() {
            UNKNOWN
        } else {
            event.source.as_str()
        };
        *stats.sources.entry(source.to_string()).or_insert(0) += 1;

        let category = event.category.as_deref().unwrap_or(UNKNOWN);
        *stats.categories.entry(category.to_string()).or_insert(0) += 1;

        for age in &event.age_groups {
            *stats.age_groups.entry(age.clone()).or_insert(0) += 1;
        }
    }

    let dates = events.iter().filter_map(|e| e.date.as_deref());
    stats.date_range = DateRange {
        earliest: dates.clone().min().map(str::to_string),
        latest: dates.max().map(str::to_string),
    };
    stats
}

/// Trim and reformat the fingerprinted fields in place.
///
/// Values that cannot be normalized are left untouched for validation to
/// reject.
fn normalize_key_fields(event: &mut EventRecord) {
    if let Some(title) = event.title.as_mut() {
        let trimmed = title.trim();
        if !trimmed.is_empty() && trimmed.len() != title.len() {
            *title = trimmed.to_string();
        }
    }
    if let Some(date) = event.date.as_deref().and_then(parse_date) {
        event.date = Some(format_date(date));
    }
    if let Some(start_time) = event.start_time.as_deref().and_then(normalize_time) {
        event.start_time = Some(start_time);
    }
    if let Some(venue) = event.venue.as_mut() {
        let trimmed = venue.name.trim();
        if trimmed.len() != venue.name.len() {
            venue.name = trimmed.to_string();
        }
    }
}

/// Validate one record, returning `(title, reason)` when it is dropped.
fn normalize_event(mut event: EventRecord) -> Result<EventRecord, (String, &'static str)> {
    let title = event
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let label = title.clone().unwrap_or_else(|| UNKNOWN.to_string());

    let Some(title) = title else {
        return Err((label, "missing title"));
    };
    let Some(date) = event.date.as_deref().and_then(parse_date) else {
        return Err((label, "missing or invalid date"));
    };
    let Some(start_time) = event.start_time.as_deref().and_then(normalize_time) else {
        return Err((label, "missing or invalid start_time"));
    };
    if event.venue_name().is_none() {
        return Err((label, "missing venue"));
    }

    event.title = Some(title);
    event.date = Some(format_date(date));
    event.start_time = Some(start_time);
    event.end_time = event.end_time.as_deref().and_then(normalize_time);

    if event.age_groups.is_empty() {
        event.age_groups = vec![ALL_AGES.to_string()];
    }
    if event.category.is_none() {
        event.category = Some(DEFAULT_CATEGORY.to_string());
    }
    if event.icon.is_none() {
        event.icon = Some(DEFAULT_ICON.to_string());
    }
    if event.indoor_outdoor.is_none() {
        event.indoor_outdoor = Some(Setting::Indoor);
    }
    if event.organized_by.is_none() {
        event.organized_by = Some(DEFAULT_ORGANIZER.to_string());
    }

    Ok(event)
}
