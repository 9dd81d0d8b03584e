// src/services/geocode.rs

//! Shared address geocoding service.
//!
//! Same cache store, rate limiter and failure policy as place lookup, so
//! every caller that needs coordinates goes through one code path.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::models::GeocodingConfig;
use crate::services::lookup::{LookupError, LookupStats, address_key};
use crate::services::rate_limit::RateLimiter;
use crate::storage::{CacheStore, JsonFileCache};
use crate::utils::http::create_async_client;

/// A resolved coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both axes within `tolerance` of `other`.
    pub fn is_near(&self, other: Coordinates, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() < tolerance && (self.lng - other.lng).abs() < tolerance
    }
}

/// Transport for address geocoding. `Ok(None)` means zero results.
#[async_trait]
pub trait GeocodeBackend: Send + Sync {
    async fn geocode(&self, address: &str) -> std::result::Result<Option<Coordinates>, LookupError>;
}

/// Geocoding API backend.
pub struct GeocodingApi {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GeocodingApi {
    pub fn new(client: Client, endpoint: &str, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &GeocodingConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = create_async_client(config.timeout_secs)?;
        Self::new(client, &config.url, api_key)
    }

    fn request_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("address", address)
            .append_pair("key", &self.api_key);
        url
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

/// Interpret a geocoding response body.
fn parse_geocode_response(body: &str) -> std::result::Result<Option<Coordinates>, LookupError> {
    let response: GeocodeResponse = serde_json::from_str(body)
        .map_err(|e| LookupError::Permanent(format!("malformed geocode response: {}", e)))?;

    let detail = || {
        format!(
            "{}: {}",
            response.status,
            response.error_message.as_deref().unwrap_or("no details")
        )
    };

    match response.status.as_str() {
        "OK" => Ok(response.results.first().map(|r| r.geometry.location)),
        "ZERO_RESULTS" => Ok(None),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" | "REQUEST_DENIED" | "UNKNOWN_ERROR" => {
            Err(LookupError::Transient(detail()))
        }
        _ => Err(LookupError::Permanent(detail())),
    }
}

#[async_trait]
impl GeocodeBackend for GeocodingApi {
    async fn geocode(&self, address: &str) -> std::result::Result<Option<Coordinates>, LookupError> {
        let response = self
            .client
            .get(self.request_url(address))
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
        parse_geocode_response(&body)
    }
}

/// Cached, rate-limited geocoder. Cached `None` is a confirmed negative.
pub struct Geocoder {
    backend: Option<Box<dyn GeocodeBackend>>,
    cache: Box<dyn CacheStore<Option<Coordinates>>>,
    limiter: RateLimiter,
    region_suffix: String,
    cache_transient_failures: bool,
    api_calls: usize,
    cache_hits: usize,
    warned_no_credentials: bool,
}

impl Geocoder {
    /// `backend` is `None` when no API key is configured.
    pub fn new(
        backend: Option<Box<dyn GeocodeBackend>>,
        cache: Box<dyn CacheStore<Option<Coordinates>>>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            backend,
            cache,
            limiter,
            region_suffix: String::new(),
            cache_transient_failures: false,
            api_calls: 0,
            cache_hits: 0,
            warned_no_credentials: false,
        }
    }

    /// Production geocoder: Geocoding API backend (when a key is present)
    /// over a flat-file cache.
    pub fn from_config(config: &GeocodingConfig, api_key: Option<&str>) -> Result<Self> {
        let backend = match api_key {
            Some(key) => Some(Box::new(GeocodingApi::from_config(config, key)?) as Box<dyn GeocodeBackend>),
            None => None,
        };
        let cache = JsonFileCache::<Option<Coordinates>>::open(&config.cache_file);

        Ok(Self::new(
            backend,
            Box::new(cache),
            RateLimiter::from_millis(config.min_delay_ms),
        )
        .configure(config))
    }

    pub fn configure(mut self, config: &GeocodingConfig) -> Self {
        self.region_suffix = config.region_suffix.clone();
        self.cache_transient_failures = config.cache_transient_failures;
        self
    }

    /// Address as sent to the backend, with the region appended when the
    /// address does not already name its city.
    pub fn full_address(&self, address: &str) -> String {
        let address = address.trim();
        let city = self
            .region_suffix
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or("");

        if city.is_empty() || address.to_lowercase().contains(&city.to_lowercase()) {
            address.to_string()
        } else {
            format!("{}, {}", address, self.region_suffix)
        }
    }

    /// Coordinates for `address`, or `None` on negatives and failures.
    pub async fn geocode(&mut self, address: &str) -> Option<Coordinates> {
        let query = self.full_address(address);
        if query.is_empty() {
            return None;
        }
        let key = address_key(&query);

        if let Some(cached) = self.cache.get(&key) {
            self.cache_hits += 1;
            return cached;
        }

        let Some(backend) = self.backend.as_ref() else {
            if !self.warned_no_credentials {
                log::warn!("No Maps API key configured, skipping geocoding");
                self.warned_no_credentials = true;
            }
            return None;
        };

        self.limiter.wait().await;
        let outcome = backend.geocode(&query).await;
        self.api_calls += 1;

        let value = match outcome {
            Ok(found) => {
                log::debug!("Geocoded '{}': {:?}", query, found);
                found
            }
            Err(e) => {
                log::warn!("Geocoding '{}' failed: {}", query, e);
                if e.is_transient() && !self.cache_transient_failures {
                    return None;
                }
                None
            }
        };

        if let Err(e) = self.cache.put(key, value) {
            log::warn!("Could not save geocode cache: {}", e);
        }
        value
    }

    pub fn stats(&self) -> LookupStats {
        LookupStats::new(self.api_calls, self.cache_hits, self.cache.len())
    }
}
