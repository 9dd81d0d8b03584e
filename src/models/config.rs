//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where feed files are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Collection and dedup behavior
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Place-id lookup settings
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Address geocoding settings
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Weekly shard settings
    #[serde(default)]
    pub sharding: ShardingConfig,

    /// Event sources, in registration order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.output.dir.as_os_str().is_empty() {
            return Err(AppError::validation("output.dir is empty"));
        }
        if self.enrichment.timeout_secs == 0 {
            return Err(AppError::validation("enrichment.timeout_secs must be > 0"));
        }
        if self.enrichment.bias_radius_m <= 0.0 {
            return Err(AppError::validation("enrichment.bias_radius_m must be > 0"));
        }
        if self.enrichment.cache_file.as_os_str().is_empty() {
            return Err(AppError::validation("enrichment.cache_file is empty"));
        }
        if self.geocoding.cache_file.as_os_str().is_empty() {
            return Err(AppError::validation("geocoding.cache_file is empty"));
        }
        if self.geocoding.timeout_secs == 0 {
            return Err(AppError::validation("geocoding.timeout_secs must be > 0"));
        }
        if self.sharding.weeks == 0 {
            return Err(AppError::validation("sharding.weeks must be > 0"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AppError::validation("source with empty name"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Sources that are switched on.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving events.json, shards and metadata
    #[serde(default = "defaults::output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: defaults::output_dir(),
        }
    }
}

/// Collection and dedup behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Source names, highest priority first. The first source to report a
    /// fingerprint keeps it.
    #[serde(default)]
    pub source_priority: Vec<String>,

    /// Lookahead window passed to collectors without their own
    #[serde(default = "defaults::days_ahead")]
    pub default_days_ahead: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            source_priority: Vec::new(),
            default_days_ahead: defaults::days_ahead(),
        }
    }
}

/// Place-id lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Skip the enrichment stage entirely
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Flat-file cache of lookups
    #[serde(default = "defaults::place_cache_file")]
    pub cache_file: PathBuf,

    /// Text-search endpoint
    #[serde(default = "defaults::search_url")]
    pub search_url: String,

    /// Minimum delay between outbound calls in milliseconds
    #[serde(default = "defaults::place_min_delay")]
    pub min_delay_ms: u64,

    /// Location-bias circle radius in meters
    #[serde(default = "defaults::bias_radius")]
    pub bias_radius_m: f64,

    /// Request timeout in seconds
    #[serde(default = "defaults::place_timeout")]
    pub timeout_secs: u64,

    /// Language tag sent with each search
    #[serde(default = "defaults::language_code")]
    pub language_code: String,

    /// Also cache timeouts, connection errors and 5xx/429/403 answers
    #[serde(default)]
    pub cache_transient_failures: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            cache_file: defaults::place_cache_file(),
            search_url: defaults::search_url(),
            min_delay_ms: defaults::place_min_delay(),
            bias_radius_m: defaults::bias_radius(),
            timeout_secs: defaults::place_timeout(),
            language_code: defaults::language_code(),
            cache_transient_failures: false,
        }
    }
}

/// Address geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Re-geocode venues with missing or placeholder coordinates
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::geocode_cache_file")]
    pub cache_file: PathBuf,

    #[serde(default = "defaults::geocode_url")]
    pub url: String,

    #[serde(default = "defaults::geocode_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "defaults::geocode_timeout")]
    pub timeout_secs: u64,

    /// Appended to addresses that do not already mention it
    #[serde(default = "defaults::region_suffix")]
    pub region_suffix: String,

    /// City-centre fallback some sources emit instead of real coordinates
    #[serde(default = "defaults::placeholder_lat")]
    pub placeholder_lat: f64,

    #[serde(default = "defaults::placeholder_lng")]
    pub placeholder_lng: f64,

    #[serde(default = "defaults::placeholder_tolerance")]
    pub placeholder_tolerance: f64,

    #[serde(default)]
    pub cache_transient_failures: bool,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            cache_file: defaults::geocode_cache_file(),
            url: defaults::geocode_url(),
            min_delay_ms: defaults::geocode_min_delay(),
            timeout_secs: defaults::geocode_timeout(),
            region_suffix: defaults::region_suffix(),
            placeholder_lat: defaults::placeholder_lat(),
            placeholder_lng: defaults::placeholder_lng(),
            placeholder_tolerance: defaults::placeholder_tolerance(),
            cache_transient_failures: false,
        }
    }
}

/// Weekly shard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardingConfig {
    /// Number of consecutive 7-day windows written
    #[serde(default = "defaults::weeks")]
    pub weeks: u32,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            weeks: defaults::weeks(),
        }
    }
}

/// A file-backed event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Identifier stamped on every record from this source
    pub name: String,

    /// JSON file written by the external scraper
    pub path: PathBuf,

    /// Overrides `aggregation.default_days_ahead`
    #[serde(default)]
    pub days_ahead: Option<u32>,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
}

mod defaults {
    use std::path::PathBuf;

    pub fn enabled() -> bool {
        true
    }

    // Output defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from("public")
    }

    // Aggregation defaults
    pub fn days_ahead() -> u32 {
        7
    }

    // Enrichment defaults
    pub fn place_cache_file() -> PathBuf {
        PathBuf::from("place_id_cache.json")
    }
    pub fn search_url() -> String {
        "https://places.googleapis.com/v1/places:searchText".into()
    }
    pub fn place_min_delay() -> u64 {
        100
    }
    pub fn bias_radius() -> f64 {
        500.0
    }
    pub fn place_timeout() -> u64 {
        5
    }
    pub fn language_code() -> String {
        "en".into()
    }

    // Geocoding defaults
    pub fn geocode_cache_file() -> PathBuf {
        PathBuf::from("geocode_cache.json")
    }
    pub fn geocode_url() -> String {
        "https://maps.googleapis.com/maps/api/geocode/json".into()
    }
    pub fn geocode_min_delay() -> u64 {
        100
    }
    pub fn geocode_timeout() -> u64 {
        10
    }
    pub fn region_suffix() -> String {
        "Toronto, ON, Canada".into()
    }
    pub fn placeholder_lat() -> f64 {
        43.6532
    }
    pub fn placeholder_lng() -> f64 {
        -79.3832
    }
    pub fn placeholder_tolerance() -> f64 {
        0.0001
    }

    // Sharding defaults
    pub fn weeks() -> u32 {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_weeks() {
        let mut config = Config::default();
        config.sharding.weeks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.enrichment.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_sources() {
        let mut config = Config::default();
        let source = SourceConfig {
            name: "TPL".to_string(),
            path: PathBuf::from("tpl.json"),
            days_ahead: None,
            enabled: true,
        };
        config.sources = vec![source.clone(), source];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [aggregation]
            source_priority = ["TPL", "EarlyON"]

            [[sources]]
            name = "TPL"
            path = "sources/tpl.json"

            [[sources]]
            name = "ROM"
            path = "sources/rom.json"
            days_ahead = 90
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.aggregation.source_priority, vec!["TPL", "EarlyON"]);
        assert_eq!(config.aggregation.default_days_ahead, 7);
        assert_eq!(config.enrichment.min_delay_ms, 100);
        assert_eq!(config.enrichment.bias_radius_m, 500.0);
        assert_eq!(config.sharding.weeks, 4);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.enabled_sources().count(), 1);
        assert_eq!(config.sources[1].days_ahead, Some(90));
    }
}
