// src/services/lookup.rs

//! Types shared by the place and geocode lookup services.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Why an external lookup produced no answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Timeout, connection failure, 5xx, 429 or quota denial; worth retrying
    /// on a later run.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The request itself was rejected; retrying will not help.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl LookupError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LookupError::Transient(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            LookupError::Transient(message)
        } else {
            LookupError::Permanent(message)
        }
    }

    /// Classify a transport-level reqwest failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Permanent(format!("undecodable response: {}", err))
        } else {
            LookupError::Transient(err.to_string())
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Cache key for a venue: SHA-256 of the trimmed, lowercased name and
/// address.
pub fn cache_key(name: &str, address: &str) -> String {
    let key = format!(
        "{}|{}",
        name.trim().to_lowercase(),
        address.trim().to_lowercase()
    );
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Cache key for a free-form address.
pub fn address_key(address: &str) -> String {
    hex::encode(Sha256::digest(address.trim().to_lowercase().as_bytes()))
}

/// Cache effectiveness counters for one lookup service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LookupStats {
    pub api_calls: usize,
    pub cache_hits: usize,
    pub cache_size: usize,
    /// Share of lookups answered from the cache, in percent.
    pub hit_rate: f64,
}

impl LookupStats {
    pub fn new(api_calls: usize, cache_hits: usize, cache_size: usize) -> Self {
        let total = api_calls + cache_hits;
        let hit_rate = if total == 0 {
            0.0
        } else {
            cache_hits as f64 * 100.0 / total as f64
        };

        Self {
            api_calls,
            cache_hits,
            cache_size,
            hit_rate,
        }
    }
}

impl fmt::Display for LookupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} API calls, {} cache hits ({:.1}% hit rate), {} cached entries",
            self.api_calls,
            self.cache_hits,
            self.hit_rate,
            self.cache_size
        )
    }
}
