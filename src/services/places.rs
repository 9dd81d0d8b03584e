// src/services/places.rs

//! Place-id enrichment.
//!
//! [`PlaceLookup`] resolves a venue (name, address, optional coordinate
//! hint) to a stable place identifier. Answers are kept in a
//! [`CacheStore`] so each venue costs at most one API call across runs.
//!
//! Cache policy:
//! - a match and a confirmed "no results" answer are always cached
//! - transient failures are cached only with `cache_transient_failures`
//! - nothing is cached when no API key is configured

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::models::{EnrichmentConfig, Venue};
use crate::services::lookup::{LookupError, LookupStats, cache_key};
use crate::services::rate_limit::RateLimiter;
use crate::storage::{CacheStore, JsonFileCache};
use crate::utils::http::create_async_client;

const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.location";

/// A text-search request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    pub text: String,
    pub bias: Option<LocationBias>,
    pub language_code: String,
}

/// Circle the search is biased towards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationBias {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
}

/// First candidate returned by a search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceMatch {
    pub place_id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Transport for place text search.
///
/// `Ok(None)` means the service answered with zero candidates.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &PlaceQuery) -> std::result::Result<Option<PlaceMatch>, LookupError>;
}

/// Places API (New) text search backend.
pub struct PlacesApi {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl PlacesApi {
    pub fn new(client: Client, endpoint: &str, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            api_key: api_key.into(),
        })
    }

    /// Build a backend with its own HTTP client from configuration.
    pub fn from_config(config: &EnrichmentConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = create_async_client(config.timeout_secs)?;
        Self::new(client, &config.search_url, api_key)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextRequest<'a> {
    text_query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_bias: Option<BiasBody>,
    language_code: &'a str,
}

#[derive(Debug, Serialize)]
struct BiasBody {
    circle: CircleBody,
}

#[derive(Debug, Serialize)]
struct CircleBody {
    center: LatLng,
    radius: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl<'a> SearchTextRequest<'a> {
    fn from_query(query: &'a PlaceQuery) -> Self {
        Self {
            text_query: &query.text,
            location_bias: query.bias.map(|b| BiasBody {
                circle: CircleBody {
                    center: LatLng {
                        latitude: b.lat,
                        longitude: b.lng,
                    },
                    radius: b.radius_m,
                },
            }),
            language_code: &query.language_code,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<PlaceBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<DisplayName>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    location: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DisplayName {
    Localized { text: String },
    Plain(String),
}

impl DisplayName {
    fn into_text(self) -> String {
        match self {
            DisplayName::Localized { text } => text,
            DisplayName::Plain(text) => text,
        }
    }
}

/// Extract the first candidate from a text-search response body.
fn parse_search_response(body: &str) -> std::result::Result<Option<PlaceMatch>, LookupError> {
    let response: SearchTextResponse = serde_json::from_str(body)
        .map_err(|e| LookupError::Permanent(format!("malformed search response: {}", e)))?;

    let Some(place) = response.places.into_iter().next() else {
        return Ok(None);
    };
    let Some(place_id) = place.id.filter(|id| !id.is_empty()) else {
        return Ok(None);
    };

    Ok(Some(PlaceMatch {
        place_id,
        name: place.display_name.map(DisplayName::into_text),
        address: place.formatted_address,
        lat: place.location.as_ref().map(|l| l.latitude),
        lng: place.location.as_ref().map(|l| l.longitude),
    }))
}

#[async_trait]
impl PlaceSearch for PlacesApi {
    async fn search(&self, query: &PlaceQuery) -> std::result::Result<Option<PlaceMatch>, LookupError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&SearchTextRequest::from_query(query))
            .send()
            .await
            .map_err(|e| LookupError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::from_transport(&e))?;

        if !status.is_success() {
            return Err(LookupError::from_status(status, &body));
        }
        parse_search_response(&body)
    }
}

/// One cached lookup outcome. `place_id` is `None` for a cached negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlaceCacheEntry {
    pub place_id: Option<String>,

    #[serde(default)]
    pub venue_name: String,

    #[serde(default)]
    pub address: String,

    /// Local timestamp of the API call
    #[serde(default)]
    pub looked_up_at: Option<String>,

    #[serde(default, alias = "google_name", skip_serializing_if = "Option::is_none")]
    pub resolved_name: Option<String>,

    #[serde(default, alias = "google_address", skip_serializing_if = "Option::is_none")]
    pub resolved_address: Option<String>,

    #[serde(default, alias = "google_lat", skip_serializing_if = "Option::is_none")]
    pub resolved_lat: Option<f64>,

    #[serde(default, alias = "google_lng", skip_serializing_if = "Option::is_none")]
    pub resolved_lng: Option<f64>,

    /// Failure recorded alongside a cached negative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlaceCacheEntry {
    fn new(name: &str, address: &str) -> Self {
        Self {
            venue_name: name.to_string(),
            address: address.to_string(),
            looked_up_at: Some(Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
            ..Self::default()
        }
    }

    fn with_match(mut self, found: PlaceMatch) -> Self {
        self.place_id = Some(found.place_id);
        self.resolved_name = found.name;
        self.resolved_address = found.address;
        self.resolved_lat = found.lat;
        self.resolved_lng = found.lng;
        self
    }
}

/// Venue enrichment port used by the aggregator.
#[async_trait]
pub trait Enrichment: Send {
    /// Resolve a venue to a place id. `None` covers negatives and failures.
    async fn lookup(
        &mut self,
        name: &str,
        address: &str,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Option<String>;

    /// Write the place id into `venue`, backfilling coordinates the venue
    /// lacks.
    async fn enrich_venue(&mut self, venue: &mut Venue) -> Option<String>;

    fn stats(&self) -> LookupStats;
}

/// Cached, rate-limited place-id lookup.
pub struct PlaceLookup {
    search: Option<Box<dyn PlaceSearch>>,
    cache: Box<dyn CacheStore<PlaceCacheEntry>>,
    limiter: RateLimiter,
    bias_radius_m: f64,
    language_code: String,
    cache_transient_failures: bool,
    api_calls: usize,
    cache_hits: usize,
    warned_no_credentials: bool,
}

impl PlaceLookup {
    /// `search` is `None` when no API key is configured.
    pub fn new(
        search: Option<Box<dyn PlaceSearch>>,
        cache: Box<dyn CacheStore<PlaceCacheEntry>>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            search,
            cache,
            limiter,
            bias_radius_m: 500.0,
            language_code: "en".to_string(),
            cache_transient_failures: false,
            api_calls: 0,
            cache_hits: 0,
            warned_no_credentials: false,
        }
    }

    /// Production lookup: Places API backend (when a key is present) over a
    /// flat-file cache.
    pub fn from_config(config: &EnrichmentConfig, api_key: Option<&str>) -> Result<Self> {
        let search = match api_key {
            Some(key) => Some(Box::new(PlacesApi::from_config(config, key)?) as Box<dyn PlaceSearch>),
            None => None,
        };
        let cache = JsonFileCache::<PlaceCacheEntry>::open(&config.cache_file);

        Ok(Self::new(
            search,
            Box::new(cache),
            RateLimiter::from_millis(config.min_delay_ms),
        )
        .configure(config))
    }

    /// Apply radius, language and failure policy from configuration.
    pub fn configure(mut self, config: &EnrichmentConfig) -> Self {
        self.bias_radius_m = config.bias_radius_m;
        self.language_code = config.language_code.clone();
        self.cache_transient_failures = config.cache_transient_failures;
        self
    }

    /// Full cache entry for a venue, hitting the API on a miss.
    async fn resolve(
        &mut self,
        name: &str,
        address: &str,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Option<PlaceCacheEntry> {
        let key = cache_key(name, address);

        if let Some(entry) = self.cache.get(&key) {
            self.cache_hits += 1;
            log::debug!("Place cache hit for '{}'", name);
            return Some(entry);
        }

        let Some(search) = self.search.as_ref() else {
            if !self.warned_no_credentials {
                log::warn!("No Maps API key configured, skipping place-id lookups");
                self.warned_no_credentials = true;
            }
            return None;
        };

        let query = PlaceQuery {
            text: format!("{}, {}", name, address),
            bias: match (lat, lng) {
                (Some(lat), Some(lng)) => Some(LocationBias {
                    lat,
                    lng,
                    radius_m: self.bias_radius_m,
                }),
                _ => None,
            },
            language_code: self.language_code.clone(),
        };

        self.limiter.wait().await;
        let outcome = search.search(&query).await;
        self.api_calls += 1;

        let entry = PlaceCacheEntry::new(name, address);
        let entry = match outcome {
            Ok(Some(found)) => {
                log::debug!("Resolved '{}' to {}", name, found.place_id);
                entry.with_match(found)
            }
            Ok(None) => {
                log::debug!("No place found for '{}'", name);
                entry
            }
            Err(e) => {
                log::warn!("Place lookup for '{}' failed: {}", name, e);
                if e.is_transient() && !self.cache_transient_failures {
                    return None;
                }
                PlaceCacheEntry {
                    error: Some(e.to_string()),
                    ..entry
                }
            }
        };

        if let Err(e) = self.cache.put(key, entry.clone()) {
            log::warn!("Could not save place cache: {}", e);
        }
        Some(entry)
    }
}

#[async_trait]
impl Enrichment for PlaceLookup {
    async fn lookup(
        &mut self,
        name: &str,
        address: &str,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Option<String> {
        self.resolve(name, address, lat, lng)
            .await
            .and_then(|entry| entry.place_id)
    }

    async fn enrich_venue(&mut self, venue: &mut Venue) -> Option<String> {
        if venue.name.trim().is_empty() || venue.address.trim().is_empty() {
            return None;
        }

        let entry = self
            .resolve(&venue.name, &venue.address, venue.lat, venue.lng)
            .await?;
        let place_id = entry.place_id?;

        venue.place_id = Some(place_id.clone());
        if !venue.has_coordinates() {
            if let (Some(lat), Some(lng)) = (entry.resolved_lat, entry.resolved_lng) {
                venue.lat = Some(lat);
                venue.lng = Some(lng);
            }
        }
        Some(place_id)
    }

    fn stats(&self) -> LookupStats {
        LookupStats::new(self.api_calls, self.cache_hits, self.cache.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Replays canned outcomes and records every query.
    #[derive(Clone, Default)]
    struct FakeSearch {
        outcomes: Arc<Mutex<VecDeque<std::result::Result<Option<PlaceMatch>, LookupError>>>>,
        queries: Arc<Mutex<Vec<PlaceQuery>>>,
    }

    impl FakeSearch {
        fn with(outcomes: Vec<std::result::Result<Option<PlaceMatch>, LookupError>>) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.into())),
                queries: Arc::default(),
            }
        }

        fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PlaceSearch for FakeSearch {
        async fn search(
            &self,
            query: &PlaceQuery,
        ) -> std::result::Result<Option<PlaceMatch>, LookupError> {
            self.queries.lock().unwrap().push(query.clone());
            self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn rom_match() -> PlaceMatch {
        PlaceMatch {
            place_id: "ChIJrom".to_string(),
            name: Some("Royal Ontario Museum".to_string()),
            address: Some("100 Queens Park, Toronto".to_string()),
            lat: Some(43.6677),
            lng: Some(-79.3948),
        }
    }

    fn lookup_with(fake: &FakeSearch, tmp: &TempDir) -> PlaceLookup {
        let cache = JsonFileCache::open(tmp.path().join("places.json"));
        PlaceLookup::new(
            Some(Box::new(fake.clone())),
            Box::new(cache),
            RateLimiter::from_millis(0),
        )
    }

    #[tokio::test]
    async fn test_second_lookup_is_cache_hit() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Ok(Some(rom_match()))]);
        let mut lookup = lookup_with(&fake, &tmp);

        let first = lookup.lookup("ROM", "100 Queens Park", None, None).await;
        assert_eq!(first.as_deref(), Some("ChIJrom"));
        assert_eq!(lookup.stats().api_calls, 1);

        let second = lookup.lookup("ROM", "100 Queens Park", None, None).await;
        assert_eq!(second.as_deref(), Some("ChIJrom"));
        assert_eq!(lookup.stats().api_calls, 1);
        assert_eq!(lookup.stats().cache_hits, 1);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_results_cached_as_negative() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Ok(None)]);
        let mut lookup = lookup_with(&fake, &tmp);

        assert!(lookup.lookup("Nowhere", "1 Fake St", None, None).await.is_none());
        assert!(lookup.lookup("nowhere", "1 fake st", None, None).await.is_none());
        assert_eq!(fake.calls(), 1);
        assert_eq!(lookup.stats().cache_hits, 1);
        assert_eq!(lookup.stats().cache_size, 1);
    }

    #[tokio::test]
    async fn test_cache_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Ok(Some(rom_match()))]);
        {
            let mut lookup = lookup_with(&fake, &tmp);
            lookup.lookup("ROM", "100 Queens Park", None, None).await;
        }

        let mut reopened = lookup_with(&fake, &tmp);
        let id = reopened.lookup("ROM", "100 Queens Park", None, None).await;
        assert_eq!(id.as_deref(), Some("ChIJrom"));
        assert_eq!(reopened.stats().api_calls, 0);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_not_cached_by_default() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![
            Err(LookupError::Transient("timeout".to_string())),
            Ok(Some(rom_match())),
        ]);
        let mut lookup = lookup_with(&fake, &tmp);

        assert!(lookup.lookup("ROM", "100 Queens Park", None, None).await.is_none());
        assert_eq!(lookup.stats().cache_size, 0);

        let retry = lookup.lookup("ROM", "100 Queens Park", None, None).await;
        assert_eq!(retry.as_deref(), Some("ChIJrom"));
        assert_eq!(lookup.stats().api_calls, 2);
    }

    #[tokio::test]
    async fn test_transient_failure_cached_when_configured() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Err(LookupError::Transient("timeout".to_string()))]);
        let config = EnrichmentConfig {
            cache_transient_failures: true,
            ..EnrichmentConfig::default()
        };
        let mut lookup = lookup_with(&fake, &tmp).configure(&config);

        assert!(lookup.lookup("ROM", "100 Queens Park", None, None).await.is_none());
        assert!(lookup.lookup("ROM", "100 Queens Park", None, None).await.is_none());
        assert_eq!(fake.calls(), 1);
        assert_eq!(lookup.stats().cache_size, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_cached() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Err(LookupError::Permanent("HTTP 400".to_string()))]);
        let mut lookup = lookup_with(&fake, &tmp);

        lookup.lookup("ROM", "100 Queens Park", None, None).await;
        lookup.lookup("ROM", "100 Queens Park", None, None).await;
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_without_caching() {
        let tmp = TempDir::new().unwrap();
        let cache = JsonFileCache::open(tmp.path().join("places.json"));
        let mut lookup = PlaceLookup::new(None, Box::new(cache), RateLimiter::from_millis(0));

        assert!(lookup.lookup("ROM", "100 Queens Park", None, None).await.is_none());
        let stats = lookup.stats();
        assert_eq!(stats.api_calls, 0);
        assert_eq!(stats.cache_size, 0);
    }

    #[tokio::test]
    async fn test_coordinate_hint_biases_query() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Ok(None), Ok(None)]);
        let mut lookup = lookup_with(&fake, &tmp);

        lookup
            .lookup("ROM", "100 Queens Park", Some(43.66), Some(-79.39))
            .await;
        lookup.lookup("AGO", "317 Dundas St W", Some(43.65), None).await;

        let queries = fake.queries.lock().unwrap();
        assert_eq!(queries[0].text, "ROM, 100 Queens Park");
        assert_eq!(
            queries[0].bias,
            Some(LocationBias {
                lat: 43.66,
                lng: -79.39,
                radius_m: 500.0
            })
        );
        assert_eq!(queries[0].language_code, "en");
        assert!(queries[1].bias.is_none());
    }

    #[tokio::test]
    async fn test_enrich_venue_backfills_missing_coordinates() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Ok(Some(rom_match()))]);
        let mut lookup = lookup_with(&fake, &tmp);

        let mut venue = Venue {
            name: "ROM".to_string(),
            address: "100 Queens Park".to_string(),
            ..Venue::default()
        };
        let id = lookup.enrich_venue(&mut venue).await;

        assert_eq!(id.as_deref(), Some("ChIJrom"));
        assert_eq!(venue.place_id.as_deref(), Some("ChIJrom"));
        assert_eq!(venue.lat, Some(43.6677));
        assert_eq!(venue.lng, Some(-79.3948));
    }

    #[tokio::test]
    async fn test_enrich_venue_keeps_existing_coordinates() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Ok(Some(rom_match()))]);
        let mut lookup = lookup_with(&fake, &tmp);

        let mut venue = Venue {
            name: "ROM".to_string(),
            address: "100 Queens Park".to_string(),
            lat: Some(43.0),
            lng: Some(-79.0),
            ..Venue::default()
        };
        lookup.enrich_venue(&mut venue).await;

        assert_eq!(venue.place_id.as_deref(), Some("ChIJrom"));
        assert_eq!(venue.lat, Some(43.0));
        assert_eq!(venue.lng, Some(-79.0));
    }

    #[tokio::test]
    async fn test_enrich_venue_skips_missing_address() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeSearch::with(vec![Ok(Some(rom_match()))]);
        let mut lookup = lookup_with(&fake, &tmp);

        let mut venue = Venue {
            name: "ROM".to_string(),
            ..Venue::default()
        };
        assert!(lookup.enrich_venue(&mut venue).await.is_none());
        assert_eq!(fake.calls(), 0);
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "places": [
                {
                    "id": "ChIJabc",
                    "displayName": {"text": "Toronto Public Library", "languageCode": "en"},
                    "formattedAddress": "789 Yonge St, Toronto",
                    "location": {"latitude": 43.6717, "longitude": -79.3866}
                },
                {"id": "ChIJsecond"}
            ]
        }"#;

        let found = parse_search_response(body).unwrap().unwrap();
        assert_eq!(found.place_id, "ChIJabc");
        assert_eq!(found.name.as_deref(), Some("Toronto Public Library"));
        assert_eq!(found.address.as_deref(), Some("789 Yonge St, Toronto"));
        assert_eq!(found.lat, Some(43.6717));
    }

    #[test]
    fn test_parse_empty_response_is_no_match() {
        assert_eq!(parse_search_response("{}").unwrap(), None);
        assert_eq!(parse_search_response(r#"{"places": []}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_garbage_is_permanent() {
        let err = parse_search_response("<html>").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_request_body_shape() {
        let query = PlaceQuery {
            text: "ROM, 100 Queens Park".to_string(),
            bias: Some(LocationBias {
                lat: 43.66,
                lng: -79.39,
                radius_m: 500.0,
            }),
            language_code: "en".to_string(),
        };
        let value = serde_json::to_value(SearchTextRequest::from_query(&query)).unwrap();
        assert_eq!(value["textQuery"], "ROM, 100 Queens Park");
        assert_eq!(value["languageCode"], "en");
        assert_eq!(value["locationBias"]["circle"]["radius"], 500.0);
        assert_eq!(value["locationBias"]["circle"]["center"]["latitude"], 43.66);
    }

    #[test]
    fn test_legacy_cache_entry_fields() {
        let json = r#"{
            "place_id": "ChIJold",
            "venue_name": "ROM",
            "address": "100 Queens Park",
            "looked_up_at": "2025-01-01T10:00:00",
            "google_name": "Royal Ontario Museum",
            "google_lat": 43.6677,
            "google_lng": -79.3948
        }"#;
        let entry: PlaceCacheEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.resolved_name.as_deref(), Some("Royal Ontario Museum"));
        assert_eq!(entry.resolved_lat, Some(43.6677));
    }
}
