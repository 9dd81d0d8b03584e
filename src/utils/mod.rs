//! Utility functions and helpers.

pub mod http;

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// ISO date layout used across the feed.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn time_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{2})$").ok())
        .as_ref()
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Format a date as ISO `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Normalize `H:MM` / `HH:MM` to zero-padded 24-hour `HH:MM`.
///
/// Returns `None` for anything that is not a valid clock time.
pub fn normalize_time(value: &str) -> Option<String> {
    let caps = time_pattern()?.captures(value.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;

    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", hour, minute))
}

/// Render a count with thousands separators, e.g. `1,234`.
pub fn format_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
