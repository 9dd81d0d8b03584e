//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── events.json           # Canonical feed
//! ├── events_full.json      # Feed + statistics
//! ├── metadata.json         # Page metadata
//! └── events_weekN.json     # Weekly shards
//! ```
//!
//! Every file is written to a temp sibling and renamed into place, so a
//! reader never sees a half-written feed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{FeedDocument, FullFeedDocument, Metadata, WeekShard};
use crate::storage::{FEED_FILE, FULL_FEED_FILE, FeedStorage, METADATA_FILE, shard_file};

/// JSON layout used when writing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Pretty,
    Compact,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        layout: Layout,
    ) -> Result<()> {
        let bytes = match layout {
            Layout::Pretty => serde_json::to_vec_pretty(value)?,
            Layout::Compact => serde_json::to_vec(value)?,
        };
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FeedStorage for LocalStorage {
    async fn write_feed(&self, feed: &FeedDocument) -> Result<()> {
        self.write_json(FEED_FILE, feed, Layout::Pretty).await?;
        log::info!("{} events written to {}", feed.total_events, FEED_FILE);
        Ok(())
    }

    async fn write_full_feed(&self, feed: &FullFeedDocument) -> Result<()> {
        self.write_json(FULL_FEED_FILE, feed, Layout::Pretty).await?;
        log::info!("{} events written to {}", feed.total_events, FULL_FEED_FILE);
        Ok(())
    }

    async fn write_metadata(&self, metadata: &Metadata) -> Result<()> {
        self.write_json(METADATA_FILE, metadata, Layout::Compact)
            .await?;
        log::info!(
            "Metadata: {} events at {} venues (next 7 days)",
            metadata.human_readable.events,
            metadata.human_readable.venues
        );
        Ok(())
    }

    async fn write_shard(&self, week: usize, shard: &WeekShard) -> Result<()> {
        let key = shard_file(week);
        self.write_json(&key, shard, Layout::Compact).await?;
        log::info!("{}: {} events -> {}", shard.week, shard.total_events, key);
        Ok(())
    }

    async fn load_feed(&self) -> Result<FeedDocument> {
        let path = self.path(FEED_FILE);
        match self.read_json::<FeedDocument>(FEED_FILE).await {
            Ok(Some(feed)) => Ok(feed),
            Ok(None) => Err(AppError::feed(format!(
                "{} not found",
                path.display()
            ))),
            Err(AppError::Json(e)) => Err(AppError::feed(format!(
                "{} is not a valid feed: {}",
                path.display(),
                e
            ))),
            Err(e) => Err(e),
        }
    }
}
