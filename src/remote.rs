//! Remote collection source.
//!
//! The sync core is schema-agnostic: collections cross this boundary as
//! vectors of opaque JSON values keyed by collection name. Any backend that
//! can produce that map is a valid source - the bundled `HttpRemoteSource`
//! talks to a REST endpoint, tests use counting mocks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::store::{KEY_CATEGORIES_SNAPSHOT, KEY_SERVICES_SNAPSHOT};

/// A named entity collection mirrored wholesale - never partially updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Services,
    Categories,
}

impl Collection {
    /// Every collection a refresh batch requires.
    pub const ALL: [Collection; 2] = [Collection::Services, Collection::Categories];

    /// Stable wire name of the collection.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Services => "services",
            Collection::Categories => "categories",
        }
    }

    /// Store key the collection snapshot is persisted under.
    pub fn snapshot_key(&self) -> &'static str {
        match self {
            Collection::Services => KEY_SERVICES_SNAPSHOT,
            Collection::Categories => KEY_CATEGORIES_SNAPSHOT,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Records of one fetched collection, opaque to the sync core.
pub type Records = Vec<Value>;

/// One fetched batch: collection name to records.
pub type CollectionSet = HashMap<Collection, Records>;

/// Read-only source of entity collections. Always authoritative; the client
/// never writes back through this seam.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the named collections as one batch.
    ///
    /// Implementations should either return every requested collection or an
    /// error; a partial map is treated by the caller as a failed batch.
    async fn fetch_collections(&self, names: &[Collection]) -> Result<CollectionSet, FetchError>;
}

/// REST-backed remote source.
///
/// Expects `GET {base_url}/collections/{name}` to return a JSON array of
/// records. Clone is cheap - `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct HttpRemoteSource {
    client: Client,
    base_url: String,
}

impl HttpRemoteSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_one(&self, collection: Collection) -> Result<Records, FetchError> {
        let url = format!("{}/collections/{}", self.base_url, collection.name());

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, &body));
        }

        let records: Records = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        debug!(collection = %collection, count = records.len(), "collection fetched");
        Ok(records)
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_collections(&self, names: &[Collection]) -> Result<CollectionSet, FetchError> {
        let mut set = CollectionSet::new();
        for collection in names {
            let records = self.fetch_one(*collection).await?;
            set.insert(*collection, records);
        }
        Ok(set)
    }
}
