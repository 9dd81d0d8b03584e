//! Page metadata for the coming week.

use std::collections::HashSet;

use chrono::{Days, Local, NaiveDate, Utc};

use crate::models::{EventRecord, HumanReadable, Metadata, MetadataRange};
use crate::utils::{format_date, format_thousands, parse_date};

/// Summarize events in `[today, today + 7)`.
///
/// Venues are counted by distinct non-empty name.
pub fn build_metadata(events: &[EventRecord], today: NaiveDate) -> Metadata {
    let next_week = today + Days::new(7);

    let week_events: Vec<&EventRecord> = events
        .iter()
        .filter(|e| {
            e.date
                .as_deref()
                .and_then(parse_date)
                .is_some_and(|d| today <= d && d < next_week)
        })
        .collect();

    let venues: HashSet<&str> = week_events.iter().filter_map(|e| e.venue_name()).collect();

    Metadata {
        generated_at: Utc::now(),
        total_events: week_events.len(),
        total_venues: venues.len(),
        date_range: MetadataRange {
            start: format_date(today),
            end: format_date(next_week),
        },
        human_readable: HumanReadable {
            events: format_thousands(week_events.len()),
            venues: format_thousands(venues.len()),
            date_generated: Local::now().format("%B %d, %Y").to_string(),
        },
    }
}
