//! File-backed store: one JSON document per key.
//!
//! Records live under a schema-versioned directory (`db-v1`); bumping
//! `SCHEMA_VERSION` starts a fresh key space and the only migration action is
//! creating the directory. Writes go through a uniquely-named temp file
//! followed by a rename, so a concurrent reader sees either the old record or
//! the new one, never a torn write.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::error::StoreError;

use super::{CacheRecord, LocalStore};

/// Integer schema version; bump to start a new key space.
const SCHEMA_VERSION: u32 = 1;

/// Suffix for record files
const RECORD_EXT: &str = "json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Open (and if needed create) the store under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = root.into().join(format!("db-v{}", SCHEMA_VERSION));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Record file for a key.
    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_stem(key), RECORD_EXT))
    }
}

/// Escape a key into a flat filename stem. Keys are opaque strings, so bytes
/// outside `[A-Za-z0-9._-]` (separators included) become `%XX`; escaping `%`
/// itself keeps the mapping injective.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for &b in key.as_bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => stem.push(b as char),
            _ => stem.push_str(&format!("%{:02X}", b)),
        }
    }
    stem
}

#[async_trait]
impl LocalStore for FsStore {
    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let record = CacheRecord::new(key, value.clone());
        let contents = serde_json::to_vec(&record)?;

        let path = self.key_path(key);
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            file_stem(key),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&tmp, &contents).await?;
        fs::rename(&tmp, &path).await?;
        debug!(key, bytes = contents.len(), "record stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, StoreError> {
        match fs::read(self.key_path(key)).await {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}
