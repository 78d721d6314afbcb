//! Configuration for the sync coordinator and the asset cache worker.
//!
//! Everything is constructed in code at the composition root and injected;
//! there is no global configuration state.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use reqwest::Url;

use crate::remote::Collection;

/// Application name used for the default cache directory path
const APP_NAME: &str = "mirrorcache";

/// Freshness window for the `services` collection.
/// Listing data changes during the day, so 2 hours keeps the mirror close to
/// the source without hammering it.
const SERVICES_FRESHNESS_HOURS: i64 = 2;

/// Freshness window for the `categories` collection.
/// The taxonomy changes rarely; 24 hours is plenty.
const CATEGORIES_FRESHNESS_HOURS: i64 = 24;

/// Minimum interval between forced update checks.
/// 5 minutes stops a trigger-happy consumer from turning every navigation
/// into a full remote round trip.
const UPDATE_CHECK_INTERVAL_SECS: i64 = 300;

/// Bound on a whole remote refresh batch.
/// 30s allows for slow responses while guaranteeing a hung fetch cannot
/// starve later callers through the in-flight refresh slot.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Default path prefix for dynamic API requests at the interception layer
const DEFAULT_API_PREFIX: &str = "/api/";

/// Third-party font hosts the asset cache is allowed to cache
const DEFAULT_FONT_HOSTS: [&str; 2] = ["fonts.googleapis.com", "fonts.gstatic.com"];

/// Maximum age per collection before a cached snapshot requires a re-fetch.
#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    pub services: Duration,
    pub categories: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            services: Duration::hours(SERVICES_FRESHNESS_HOURS),
            categories: Duration::hours(CATEGORIES_FRESHNESS_HOURS),
        }
    }
}

impl FreshnessPolicy {
    pub fn window(&self, collection: Collection) -> Duration {
        match collection {
            Collection::Services => self.services,
            Collection::Categories => self.categories,
        }
    }

    /// A snapshot is fresh only when every collection is within its window.
    /// Collections are refreshed as one batch under a single timestamp, so
    /// the tightest window governs.
    pub fn is_fresh(&self, last_updated: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now - last_updated;
        Collection::ALL.iter().all(|c| age < self.window(*c))
    }
}

/// Configuration for [`crate::sync::SyncCoordinator`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub freshness: FreshnessPolicy,
    pub update_check_interval: Duration,
    pub fetch_timeout: StdDuration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            freshness: FreshnessPolicy::default(),
            update_check_interval: Duration::seconds(UPDATE_CHECK_INTERVAL_SECS),
            fetch_timeout: StdDuration::from_secs(FETCH_TIMEOUT_SECS),
        }
    }
}

/// Configuration for [`crate::assets::AssetCacheManager`].
#[derive(Debug, Clone)]
pub struct AssetCacheConfig {
    /// Origin the application is served from; same-origin static requests are
    /// cached, foreign origins pass through untouched.
    pub origin: Url,
    /// Same-origin requests under this path prefix are dynamic and get the
    /// network-first policy.
    pub api_prefix: String,
    /// Foreign hosts on the static allow-list (font CDNs).
    pub font_hosts: Vec<String>,
    /// Root directory holding one subdirectory per cache version.
    pub assets_dir: PathBuf,
}

impl AssetCacheConfig {
    pub fn new(origin: Url, assets_dir: PathBuf) -> Self {
        Self {
            origin,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            font_hosts: DEFAULT_FONT_HOSTS.iter().map(|h| h.to_string()).collect(),
            assets_dir,
        }
    }
}

/// Platform cache directory for the durable store, e.g.
/// `~/.cache/mirrorcache` on Linux.
pub fn default_cache_dir() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
    Ok(cache_dir.join(APP_NAME))
}
