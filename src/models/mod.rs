// src/models/mod.rs

//! Domain models for the aggregation pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod event;
mod feed;

// Re-export all public types
pub use config::{
    AggregationConfig, Config, EnrichmentConfig, GeocodingConfig, OutputConfig, ShardingConfig,
    SourceConfig,
};
pub use event::{ALL_AGES, EventRecord, FreeStatus, Setting, Venue, fingerprint};
pub use feed::{
    DateRange, FeedDocument, FullFeedDocument, HumanReadable, Metadata, MetadataRange, Statistics,
    WeekShard,
};
