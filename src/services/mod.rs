//! Service layer for the aggregation pipeline.
//!
//! This module contains:
//! - Event sources (`Collector`, `JsonFileCollector`)
//! - Place-id enrichment (`PlaceLookup` behind the `Enrichment` port)
//! - Address geocoding (`Geocoder`)
//! - The shared outbound rate limiter (`RateLimiter`)

pub mod collector;
pub mod geocode;
pub mod lookup;
pub mod places;
pub mod rate_limit;

pub use collector::{Collector, JsonFileCollector, collectors_from_config};
pub use geocode::{Coordinates, GeocodeBackend, Geocoder, GeocodingApi};
pub use lookup::{LookupError, LookupStats};
pub use places::{
    Enrichment, LocationBias, PlaceCacheEntry, PlaceLookup, PlaceMatch, PlaceQuery, PlaceSearch,
    PlacesApi,
};
pub use rate_limit::RateLimiter;
