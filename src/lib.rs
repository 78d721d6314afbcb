//! mirrorcache - offline-first sync core for client applications.
//!
//! Keeps a local mirror of remotely-sourced entity collections consistent
//! across restarts, network loss, and application upgrades. Three cooperating
//! pieces:
//!
//! - [`sync::SyncCoordinator`] refreshes the collection mirror with
//!   single-flight coalescing, a freshness policy, and write-through to a
//!   durable [`store::LocalStore`].
//! - [`assets::AssetCacheManager`] runs in an isolated worker task, manages a
//!   versioned static-asset cache, and intercepts requests with cache-first /
//!   network-first policies.
//! - [`upgrade::UpgradeCoordinator`] turns a version activation into one
//!   forced reload, so mixed-version execution never happens.
//!
//! Construct everything at the composition root and inject it; there is no
//! global state:
//!
//! ```no_run
//! use std::sync::Arc;
//! use mirrorcache::{
//!     FsStore, HttpRemoteSource, LocalStore, SyncConfig, SyncCoordinator,
//! };
//!
//! # async fn compose() -> anyhow::Result<()> {
//! let config = SyncConfig::default();
//! let store: Arc<dyn LocalStore> =
//!     Arc::new(FsStore::open(mirrorcache::default_cache_dir()?)?);
//! let remote = HttpRemoteSource::new("https://api.example.org", config.fetch_timeout)?;
//! let coordinator = SyncCoordinator::open(remote, store, config).await;
//!
//! if coordinator.refresh(false).await {
//!     for service in coordinator.services() {
//!         println!("{}", service.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub mod upgrade;

pub use assets::{
    AssetBody, AssetCacheHandle, AssetCacheManager, AssetFetcher, AssetManifest, AssetRequest,
    CacheUpdatedData, FetchResponse, HttpAssetFetcher, WorkerMessage,
};
pub use config::{default_cache_dir, AssetCacheConfig, FreshnessPolicy, SyncConfig};
pub use error::{AssetError, FetchError, StoreError};
pub use models::{Category, Service};
pub use remote::{Collection, CollectionSet, HttpRemoteSource, Records, RemoteSource};
pub use store::{CacheRecord, FsStore, LocalStore, MemoryStore};
pub use sync::{Snapshot, SyncCoordinator, SyncStatus, SyncUpdate};
pub use upgrade::{Reloader, UpgradeCoordinator};
