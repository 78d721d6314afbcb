//! Durable async key-value store.
//!
//! One database, one key space, last-writer-wins per key. The sync core and
//! the asset cache worker share a single store instance; key-prefix ownership
//! is by convention, not enforced here.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Key for the persisted `services` collection snapshot
pub const KEY_SERVICES_SNAPSHOT: &str = "services-snapshot";
/// Key for the persisted `categories` collection snapshot
pub const KEY_CATEGORIES_SNAPSHOT: &str = "categories-snapshot";
/// Key for the timestamp of the last successful refresh
pub const KEY_LAST_UPDATED: &str = "last-updated-timestamp";
/// Key for the currently active asset cache version
pub const KEY_CACHE_VERSION_MARKER: &str = "cache-version-marker";

/// One durable record: a key, its current value, and when it was stored.
/// Exactly one current value per key; a write replaces the whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub value: Value,
    pub stored_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(key: &str, value: Value) -> Self {
        Self {
            key: key.to_string(),
            value,
            stored_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.stored_at
    }

    pub fn is_fresh(&self, window: Duration) -> bool {
        self.age() < window
    }
}

/// Durable async key-value store.
///
/// Keys are opaque strings; values must be structurally serializable, which
/// the `serde_json::Value` boundary enforces (no live references cross it).
/// Per-key writes are atomic: concurrent callers may race on which value
/// wins, but a reader never observes a corrupt record.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Write a value under a key, replacing any previous record.
    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Read the current record for a key, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, StoreError>;

    /// Delete a single key. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Delete every record in the store.
    async fn clear(&self) -> Result<(), StoreError>;
}
