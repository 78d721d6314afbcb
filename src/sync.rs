//! Refresh orchestration for the mirrored collections.
//!
//! `SyncCoordinator` owns the in-memory snapshot, the freshness policy, the
//! single-flight refresh slot, and write-through to the durable store. All
//! failure modes resolve to a boolean at the public API; consumers decide
//! between "fresh data", "showing last-known data", and "nothing yet" via
//! [`SyncCoordinator::status`].

use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::models::{Category, Service};
use crate::remote::{Collection, RemoteSource};
use crate::store::{LocalStore, KEY_LAST_UPDATED};

/// Buffer size for the change-notification channel.
/// Refreshes are rate-limited and coarse; 16 pending notifications means a
/// consumer has stopped reading entirely.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Single-slot handle to the refresh currently in flight. Concurrent callers
/// clone it and join; the refresh clears the slot before resolving.
type InFlightRefresh = Shared<BoxFuture<'static, bool>>;

/// The decoded in-memory view of the last good batch.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub services: Vec<Service>,
    pub categories: Vec<Category>,
}

/// Change notification emitted once per successful refresh, after the
/// write-through and the in-memory swap have both completed.
#[derive(Debug, Clone)]
pub struct SyncUpdate {
    pub timestamp: DateTime<Utc>,
    pub snapshot: Arc<Snapshot>,
}

/// Consumer-facing view of the mirror's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No data was ever obtained; the hard error state if a refresh fails.
    Empty,
    /// A snapshot exists and is within its freshness window.
    Fresh,
    /// A snapshot exists but is past its freshness window - last-known data.
    Stale,
}

struct SyncState {
    last_updated: Option<DateTime<Utc>>,
    last_update_check: Option<DateTime<Utc>>,
}

struct SyncInner<R> {
    remote: R,
    store: Arc<dyn LocalStore>,
    config: SyncConfig,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    state: Mutex<SyncState>,
    in_flight: Mutex<Option<InFlightRefresh>>,
    updates: broadcast::Sender<SyncUpdate>,
}

/// Orchestrates refresh for the whole collection set.
///
/// Cloning shares the same coordinator, like cloning a channel handle.
pub struct SyncCoordinator<R: RemoteSource> {
    inner: Arc<SyncInner<R>>,
}

impl<R: RemoteSource> Clone for SyncCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteSource + 'static> SyncCoordinator<R> {
    /// Construct the coordinator and rehydrate any persisted snapshot.
    /// Performs no remote calls; a process restart serves the persisted data
    /// until the next refresh decides it is stale.
    pub async fn open(remote: R, store: Arc<dyn LocalStore>, config: SyncConfig) -> Self {
        let services: Vec<Service> =
            load_collection(store.as_ref(), Collection::Services).await;
        let categories: Vec<Category> =
            load_collection(store.as_ref(), Collection::Categories).await;

        let last_updated = match store.get(KEY_LAST_UPDATED).await {
            Ok(Some(record)) => serde_json::from_value(record.value).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read last-updated marker, treating as no cache");
                None
            }
        };

        let snapshot = if services.is_empty() && categories.is_empty() {
            None
        } else {
            info!(
                services = services.len(),
                categories = categories.len(),
                "rehydrated snapshot from local store"
            );
            Some(Arc::new(Snapshot {
                services,
                categories,
            }))
        };

        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(SyncInner {
                remote,
                store,
                config,
                snapshot: RwLock::new(snapshot),
                state: Mutex::new(SyncState {
                    last_updated,
                    last_update_check: None,
                }),
                in_flight: Mutex::new(None),
                updates,
            }),
        }
    }

    /// Refresh the mirror from the remote source.
    ///
    /// Returns `true` when usable data is available afterwards - fresh,
    /// newly fetched, or last-known - and `false` only when no data was ever
    /// obtained. If a refresh is already in flight, this call joins it
    /// instead of issuing a second remote fetch.
    pub async fn refresh(&self, force: bool) -> bool {
        if !force && self.inner.is_fresh() {
            debug!("snapshot within freshness window, skipping remote fetch");
            return true;
        }

        let refresh = {
            let mut slot = lock(&self.inner.in_flight);
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("joining in-flight refresh");
                    in_flight.clone()
                }
                None => {
                    let owner = Arc::clone(&self.inner);
                    let fut = async move {
                        let ok = owner.do_refresh().await;
                        // Clear the slot before resolving so late joiners of a
                        // finished cycle start a new one.
                        *lock(&owner.in_flight) = None;
                        ok
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        refresh.await
    }

    /// Rate-limited forced refresh. A call within the configured interval of
    /// the previous check is a no-op returning `false`.
    pub async fn check_for_updates(&self) -> bool {
        let now = Utc::now();
        {
            let mut state = lock(&self.inner.state);
            if let Some(previous) = state.last_update_check {
                if now - previous < self.inner.config.update_check_interval {
                    debug!("update check within rate-limit interval, skipping");
                    return false;
                }
            }
            state.last_update_check = Some(now);
        }
        self.refresh(true).await
    }

    /// Current `services` view; empty when nothing is loaded. Never performs I/O.
    pub fn services(&self) -> Vec<Service> {
        self.with_snapshot(|s| s.services.clone()).unwrap_or_default()
    }

    /// Current `categories` view; empty when nothing is loaded.
    pub fn categories(&self) -> Vec<Category> {
        self.with_snapshot(|s| s.categories.clone()).unwrap_or_default()
    }

    /// Look up a single category by id.
    pub fn category(&self, id: &str) -> Option<Category> {
        self.with_snapshot(|s| s.categories.iter().find(|c| c.id == id).cloned())
            .flatten()
    }

    /// Timestamp of the last successful refresh, surviving restarts.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        lock(&self.inner.state).last_updated
    }

    /// Human-readable age of the snapshot, for staleness indicators.
    pub fn last_updated_display(&self) -> String {
        match self.last_updated() {
            Some(ts) => age_display(Utc::now() - ts),
            None => "never".to_string(),
        }
    }

    /// Lifecycle state of the mirror.
    pub fn status(&self) -> SyncStatus {
        if !self.inner.has_snapshot() {
            SyncStatus::Empty
        } else if self.inner.is_fresh() {
            SyncStatus::Fresh
        } else {
            SyncStatus::Stale
        }
    }

    /// Subscribe to change notifications. One `SyncUpdate` is delivered per
    /// successful refresh cycle.
    pub fn on_update(&self) -> broadcast::Receiver<SyncUpdate> {
        self.inner.updates.subscribe()
    }

    fn with_snapshot<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Option<T> {
        let guard = self
            .inner
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|s| f(s))
    }
}

impl<R: RemoteSource> SyncInner<R> {
    fn has_snapshot(&self) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn is_fresh(&self) -> bool {
        let last_updated = match lock(&self.state).last_updated {
            Some(ts) => ts,
            None => return false,
        };
        self.has_snapshot() && self.config.freshness.is_fresh(last_updated, Utc::now())
    }

    /// One refresh cycle: fetch the whole batch, write through, swap the
    /// snapshot, notify. Exactly one of these runs at a time.
    async fn do_refresh(&self) -> bool {
        debug!("refresh cycle started");

        let fetch = self.remote.fetch_collections(&Collection::ALL);
        let mut set = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(set)) => set,
            Ok(Err(e)) => {
                warn!(error = %e, "remote fetch failed, serving cached snapshot if any");
                return self.has_snapshot();
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.fetch_timeout.as_secs(),
                    "remote fetch timed out, serving cached snapshot if any"
                );
                return self.has_snapshot();
            }
        };

        // All-or-nothing: a batch missing any required collection is
        // discarded wholesale so no mixed-freshness snapshot is ever exposed.
        let mut values = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            match set.remove(&collection) {
                Some(records) => values.push((collection, Value::Array(records))),
                None => {
                    warn!(
                        collection = %collection,
                        "collection missing from response, discarding batch"
                    );
                    return self.has_snapshot();
                }
            }
        }

        let now = Utc::now();

        // Write-through before the in-memory swap and notification, so a
        // consumer reacting to the notification always finds the persisted
        // batch. Write failures degrade to memory-only data.
        for (collection, value) in &values {
            if let Err(e) = self.store.put(collection.snapshot_key(), value).await {
                warn!(collection = %collection, error = %e, "snapshot write-through failed");
            }
        }
        match serde_json::to_value(now) {
            Ok(ts) => {
                if let Err(e) = self.store.put(KEY_LAST_UPDATED, &ts).await {
                    warn!(error = %e, "last-updated write failed");
                }
            }
            Err(e) => warn!(error = %e, "last-updated encoding failed"),
        }

        let snapshot = Arc::new(Snapshot {
            services: decode_records(Collection::Services, &values[0].1),
            categories: decode_records(Collection::Categories, &values[1].1),
        });

        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) =
            Some(Arc::clone(&snapshot));
        lock(&self.state).last_updated = Some(now);

        // Nobody listening is fine; subscription is optional.
        let _ = self.updates.send(SyncUpdate {
            timestamp: now,
            snapshot: Arc::clone(&snapshot),
        });

        info!(
            services = snapshot.services.len(),
            categories = snapshot.categories.len(),
            "refresh cycle complete"
        );
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Load one persisted collection, treating every failure as a cache miss.
async fn load_collection<T: DeserializeOwned>(
    store: &dyn LocalStore,
    collection: Collection,
) -> Vec<T> {
    match store.get(collection.snapshot_key()).await {
        Ok(Some(record)) => decode_records(collection, &record.value),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(collection = %collection, error = %e, "failed to load persisted snapshot");
            Vec::new()
        }
    }
}

/// Decode opaque records into a typed view, skipping records that no longer
/// match the expected shape instead of failing the whole collection.
fn decode_records<T: DeserializeOwned>(collection: Collection, value: &Value) -> Vec<T> {
    let Some(records) = value.as_array() else {
        warn!(collection = %collection, "snapshot value is not an array");
        return Vec::new();
    };
    records
        .iter()
        .filter_map(|record| match serde_json::from_value(record.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(collection = %collection, error = %e, "skipping undecodable record");
                None
            }
        })
        .collect()
}

/// Coarse age string for "last updated" indicators.
fn age_display(age: Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 1 {
        // Includes clock skew; pretending data from the future is current
        // beats printing a negative age.
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}
