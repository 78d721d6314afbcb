//! In-memory store for tests and cache-disabled runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

use super::{CacheRecord, LocalStore};

/// Store that keeps records in process memory. Durable only for the process
/// lifetime, which is exactly what restart simulations in tests need: share
/// one instance across two coordinator constructions.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, CacheRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.lock()
            .insert(key.to_string(), CacheRecord::new(key, value.clone()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }
}
