//! Storage abstractions for feed output and lookup caches.
//!
//! ## Directory Structure
//!
//! ```text
//! public/
//! ├── events.json           # Canonical feed (pretty)
//! ├── events_full.json      # Feed + statistics (pretty)
//! ├── metadata.json         # Next-7-days summary (compact)
//! ├── events_week1.json     # Shards (compact)
//! ├── ...
//! └── events_week4.json
//! ```
//!
//! Lookup caches live in their own flat files (see [`JsonFileCache`]).

pub mod cache;
pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FeedDocument, FullFeedDocument, Metadata, WeekShard};

// Re-export for convenience
pub use cache::{CacheStore, JsonFileCache};
pub use local::LocalStorage;

pub const FEED_FILE: &str = "events.json";
pub const FULL_FEED_FILE: &str = "events_full.json";
pub const METADATA_FILE: &str = "metadata.json";

/// File name for a 1-based week shard.
pub fn shard_file(week: usize) -> String {
    format!("events_week{}.json", week)
}

/// Trait for feed storage backends.
#[async_trait]
pub trait FeedStorage: Send + Sync {
    /// Write the canonical feed.
    async fn write_feed(&self, feed: &FeedDocument) -> Result<()>;

    /// Write the feed with statistics attached.
    async fn write_full_feed(&self, feed: &FullFeedDocument) -> Result<()>;

    /// Write compact page metadata.
    async fn write_metadata(&self, metadata: &Metadata) -> Result<()>;

    /// Write one compact weekly shard (`week` is 1-based).
    async fn write_shard(&self, week: usize, shard: &WeekShard) -> Result<()>;

    /// Read the canonical feed back. Missing or malformed feed is an error.
    async fn load_feed(&self) -> Result<FeedDocument>;
}
