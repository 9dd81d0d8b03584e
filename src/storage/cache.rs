//! Durable key-value cache for external lookups.
//!
//! The cache is a single JSON object on disk. It is loaded once, kept in
//! memory, and rewritten after every `put` so a crash never loses more than
//! the lookup in flight. Single writer, no file locking.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Key-value store behind the lookup services.
///
/// Call sites only see `get`/`put`/`flush`, so a locking or embedded-database
/// backend can replace the flat file without touching them.
pub trait CacheStore<V>: Send + Sync {
    /// Cached value for `key`, if any.
    fn get(&self, key: &str) -> Option<V>;

    /// Insert or overwrite `key`, then persist.
    fn put(&mut self, key: String, value: V) -> Result<()>;

    /// Persist the current contents.
    fn flush(&self) -> Result<()>;

    /// Number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flat-file JSON map implementation of [`CacheStore`].
#[derive(Debug)]
pub struct JsonFileCache<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
}

impl<V> JsonFileCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Open the cache at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and also starts empty; it is overwritten on the next `put`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "Could not load cache {}: {}. Starting empty.",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        log::debug!("Cache {} opened with {} entries", path.display(), entries.len());
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    fn read_entries(path: &Path) -> Result<BTreeMap<String, V>> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temp file, then rename over the cache.
    fn write_entries(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.flush()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl<V> CacheStore<V> for JsonFileCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: String, value: V) -> Result<()> {
        self.entries.insert(key, value);
        self.write_entries()
    }

    fn flush(&self) -> Result<()> {
        self.write_entries()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
