//! Versioned static-asset cache worker.
//!
//! The manager runs in its own spawned task and shares no memory with the
//! rest of the process; everything goes through the command channel on
//! [`AssetCacheHandle`] and the broadcast [`WorkerMessage`] stream. Each
//! deployed asset set lives in one version-named directory; activation
//! deletes every superseded version and announces the new one exactly once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::AssetCacheConfig;
use crate::error::{AssetError, FetchError};
use crate::store::{LocalStore, KEY_CACHE_VERSION_MARKER};

/// Buffer size for the worker command channel.
/// Commands are rare (install/activate once, fetches as they come); 32 gives
/// headroom for a burst of concurrent fetch interceptions.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Buffer size for the broadcast message channel
const MESSAGE_CHANNEL_CAPACITY: usize = 32;

/// HTTP timeout for individual asset downloads.
/// Assets are small; 20s tolerates slow links without wedging an install.
const ASSET_FETCH_TIMEOUT_SECS: u64 = 20;

/// Fixed list of assets for one deployed version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetManifest {
    /// Opaque version identifier injected at build time.
    pub version: String,
    /// Absolute URLs of every asset in this deployment.
    pub assets: Vec<String>,
}

/// Messages pushed from the worker to connected clients.
///
/// `VersionUpdated` is the mandatory upgrade trigger; the other two are
/// advisory only and must never be relied on for correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    VersionUpdated { version: String },
    BackgroundSyncStarted,
    CacheUpdated { data: CacheUpdatedData },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheUpdatedData {
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// A request presented to the interception layer.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub method: Method,
    pub url: Url,
}

impl AssetRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
        }
    }
}

/// A response body served by the interception layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetBody {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// Outcome of an intercepted fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    /// Served from the version cache.
    Cached(AssetBody),
    /// Fetched live from the network (and cached where the policy says so).
    Network(AssetBody),
    /// Outside the interception rules; the caller performs the request itself.
    NotIntercepted,
}

/// Downloads one asset. Seam for tests and alternative transports.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<AssetBody, FetchError>;
}

/// reqwest-backed asset fetcher.
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(ASSET_FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn get(&self, url: &str) -> Result<AssetBody, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, &body));
        }
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?.to_vec();
        Ok(AssetBody { body, content_type })
    }
}

/// Sidecar metadata stored next to each cached body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    content_type: Option<String>,
    fetched_at: DateTime<Utc>,
}

enum AssetCommand {
    Install {
        reply: oneshot::Sender<Result<(), AssetError>>,
    },
    Activate {
        reply: oneshot::Sender<Result<String, AssetError>>,
    },
    Fetch {
        request: AssetRequest,
        reply: oneshot::Sender<Result<FetchResponse, AssetError>>,
    },
    Reconnected,
}

/// Client-side handle to the worker. Clone freely; all clones talk to the
/// same worker task.
#[derive(Clone)]
pub struct AssetCacheHandle {
    commands: mpsc::Sender<AssetCommand>,
    messages: broadcast::Sender<WorkerMessage>,
}

impl AssetCacheHandle {
    /// Populate the version-named cache from the manifest. Any failure
    /// aborts only this version's installation; an active previous version
    /// keeps serving untouched.
    pub async fn install(&self) -> Result<(), AssetError> {
        let (tx, rx) = oneshot::channel();
        self.send(AssetCommand::Install { reply: tx }).await?;
        rx.await.map_err(|_| AssetError::WorkerGone)?
    }

    /// Make this version the only one: superseded caches are deleted, the
    /// version marker is persisted, and one `VersionUpdated` is broadcast.
    pub async fn activate(&self) -> Result<String, AssetError> {
        let (tx, rx) = oneshot::channel();
        self.send(AssetCommand::Activate { reply: tx }).await?;
        rx.await.map_err(|_| AssetError::WorkerGone)?
    }

    /// Run a request through the interception rules.
    pub async fn fetch(&self, request: AssetRequest) -> Result<FetchResponse, AssetError> {
        let (tx, rx) = oneshot::channel();
        self.send(AssetCommand::Fetch { request, reply: tx }).await?;
        rx.await.map_err(|_| AssetError::WorkerGone)?
    }

    /// Signal that connectivity returned; triggers a best-effort background
    /// resync of the manifest assets.
    pub async fn reconnected(&self) -> Result<(), AssetError> {
        self.send(AssetCommand::Reconnected).await
    }

    /// Subscribe to worker messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.messages.subscribe()
    }

    async fn send(&self, command: AssetCommand) -> Result<(), AssetError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AssetError::WorkerGone)
    }
}

/// The worker itself. Owns all asset-cache state for the process.
pub struct AssetCacheManager {
    config: AssetCacheConfig,
    manifest: AssetManifest,
    store: Arc<dyn LocalStore>,
    fetcher: Arc<dyn AssetFetcher>,
    messages: broadcast::Sender<WorkerMessage>,
}

impl AssetCacheManager {
    /// Spawn the worker task and return its handle.
    pub fn spawn(
        config: AssetCacheConfig,
        manifest: AssetManifest,
        store: Arc<dyn LocalStore>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> AssetCacheHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (msg_tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);

        let worker = Self {
            config,
            manifest,
            store,
            fetcher,
            messages: msg_tx.clone(),
        };
        tokio::spawn(worker.run(cmd_rx));

        AssetCacheHandle {
            commands: cmd_tx,
            messages: msg_tx,
        }
    }

    async fn run(self, mut commands: mpsc::Receiver<AssetCommand>) {
        info!(version = %self.manifest.version, "asset cache worker started");
        while let Some(command) = commands.recv().await {
            match command {
                AssetCommand::Install { reply } => {
                    let _ = reply.send(self.install().await);
                }
                AssetCommand::Activate { reply } => {
                    let _ = reply.send(self.activate().await);
                }
                AssetCommand::Fetch { request, reply } => {
                    let _ = reply.send(self.handle_fetch(request).await);
                }
                AssetCommand::Reconnected => self.background_resync().await,
            }
        }
        debug!("asset cache worker stopped");
    }

    fn version_dir(&self) -> PathBuf {
        self.config.assets_dir.join(&self.manifest.version)
    }

    async fn install(&self) -> Result<(), AssetError> {
        let version = &self.manifest.version;
        let staging = self
            .config
            .assets_dir
            .join(format!("{}.staging", version));
        let final_dir = self.version_dir();

        if fs::metadata(&staging).await.is_ok() {
            fs::remove_dir_all(&staging).await?;
        }
        fs::create_dir_all(&staging).await?;

        for url in &self.manifest.assets {
            let body = match self.fetcher.get(url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(version = %version, url = %url, error = %e, "install aborted");
                    let _ = fs::remove_dir_all(&staging).await;
                    return Err(AssetError::InstallAborted {
                        version: version.clone(),
                        reason: format!("{}: {}", url, e),
                    });
                }
            };
            if let Err(e) = write_entry(&staging, url, &body).await {
                let _ = fs::remove_dir_all(&staging).await;
                return Err(e);
            }
        }

        if fs::metadata(&final_dir).await.is_ok() {
            fs::remove_dir_all(&final_dir).await?;
        }
        fs::rename(&staging, &final_dir).await?;
        info!(
            version = %version,
            assets = self.manifest.assets.len(),
            "asset cache installed"
        );
        Ok(())
    }

    async fn activate(&self) -> Result<String, AssetError> {
        let version = self.manifest.version.clone();
        fs::create_dir_all(&self.config.assets_dir).await?;

        let mut entries = fs::read_dir(&self.config.assets_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == version {
                continue;
            }
            debug!(cache = %name, "deleting superseded asset cache");
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
        }

        // Readable by every store consumer, so a restarted client can tell
        // which asset set it last ran against.
        if let Err(e) = self
            .store
            .put(KEY_CACHE_VERSION_MARKER, &Value::String(version.clone()))
            .await
        {
            warn!(error = %e, "failed to persist cache version marker");
        }

        let _ = self.messages.send(WorkerMessage::VersionUpdated {
            version: version.clone(),
        });
        info!(version = %version, "asset cache activated");
        Ok(version)
    }

    async fn handle_fetch(&self, request: AssetRequest) -> Result<FetchResponse, AssetError> {
        match self.classify(&request) {
            RequestClass::NotIntercepted => Ok(FetchResponse::NotIntercepted),
            RequestClass::StaticAsset => self.cache_first(&request).await,
            RequestClass::Api => self.network_first(&request).await,
        }
    }

    /// Static assets: serve the cached copy, populate on miss.
    async fn cache_first(&self, request: &AssetRequest) -> Result<FetchResponse, AssetError> {
        let url = request.url.as_str();
        let dir = self.version_dir();

        if let Some(body) = read_entry(&dir, url).await {
            return Ok(FetchResponse::Cached(body));
        }

        match self.fetcher.get(url).await {
            Ok(body) => {
                if let Err(e) = write_entry(&dir, url, &body).await {
                    warn!(url, error = %e, "failed to populate asset cache");
                }
                Ok(FetchResponse::Network(body))
            }
            Err(e) => Err(AssetError::Fetch {
                url: url.to_string(),
                source: e,
            }),
        }
    }

    /// Dynamic requests: prefer live data, fall back to the most recent
    /// cached response for this exact URL, else propagate the failure.
    async fn network_first(&self, request: &AssetRequest) -> Result<FetchResponse, AssetError> {
        let url = request.url.as_str();
        let dir = self.version_dir();

        match self.fetcher.get(url).await {
            Ok(body) => {
                if let Err(e) = write_entry(&dir, url, &body).await {
                    warn!(url, error = %e, "failed to cache dynamic response");
                }
                Ok(FetchResponse::Network(body))
            }
            Err(e) => match read_entry(&dir, url).await {
                Some(body) => {
                    debug!(url, error = %e, "network failed, serving cached fallback");
                    Ok(FetchResponse::Cached(body))
                }
                None => Err(AssetError::Fetch {
                    url: url.to_string(),
                    source: e,
                }),
            },
        }
    }

    async fn background_resync(&self) {
        let version = self.manifest.version.clone();
        let _ = self.messages.send(WorkerMessage::BackgroundSyncStarted);
        info!(version = %version, "background resync started");

        let dir = self.version_dir();
        if let Err(e) = fs::create_dir_all(&dir).await {
            warn!(error = %e, "background resync cannot create cache directory");
            return;
        }

        for url in &self.manifest.assets {
            match self.fetcher.get(url).await {
                Ok(body) => {
                    if let Err(e) = write_entry(&dir, url, &body).await {
                        debug!(url = %url, error = %e, "resync write failed");
                    }
                }
                Err(e) => debug!(url = %url, error = %e, "resync fetch failed"),
            }
        }

        let _ = self.messages.send(WorkerMessage::CacheUpdated {
            data: CacheUpdatedData {
                timestamp: Utc::now(),
                version,
            },
        });
    }

    fn classify(&self, request: &AssetRequest) -> RequestClass {
        if request.method != Method::GET {
            return RequestClass::NotIntercepted;
        }

        let url = &request.url;
        if same_origin(url, &self.config.origin) {
            if url.path().starts_with(&self.config.api_prefix) {
                return RequestClass::Api;
            }
            return RequestClass::StaticAsset;
        }

        let allow_listed = url
            .host_str()
            .is_some_and(|host| self.config.font_hosts.iter().any(|h| h == host));
        if allow_listed {
            RequestClass::StaticAsset
        } else {
            RequestClass::NotIntercepted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestClass {
    StaticAsset,
    Api,
    NotIntercepted,
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

fn entry_paths(dir: &Path, url: &str) -> (PathBuf, PathBuf) {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    (
        dir.join(format!("{}.bin", digest)),
        dir.join(format!("{}.meta.json", digest)),
    )
}

async fn write_entry(dir: &Path, url: &str, body: &AssetBody) -> Result<(), AssetError> {
    fs::create_dir_all(dir).await?;
    let (body_path, meta_path) = entry_paths(dir, url);
    let meta = EntryMeta {
        url: url.to_string(),
        content_type: body.content_type.clone(),
        fetched_at: Utc::now(),
    };
    let meta_contents = serde_json::to_vec(&meta)
        .map_err(|e| AssetError::Io(std::io::Error::other(e)))?;

    fs::write(&body_path, &body.body).await?;
    fs::write(&meta_path, &meta_contents).await?;
    Ok(())
}

/// Read a cached entry, treating every failure as a miss.
async fn read_entry(dir: &Path, url: &str) -> Option<AssetBody> {
    let (body_path, meta_path) = entry_paths(dir, url);
    let body = match fs::read(&body_path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(url, error = %e, "failed to read cached asset, treating as miss");
            return None;
        }
    };
    let content_type = match fs::read(&meta_path).await {
        Ok(contents) => serde_json::from_slice::<EntryMeta>(&contents)
            .ok()
            .and_then(|meta| meta.content_type),
        Err(_) => None,
    };
    Some(AssetBody { body, content_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockFetcher {
        calls: AtomicUsize,
        responses: Mutex<HashMap<String, Result<Vec<u8>, ()>>>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(HashMap::new()),
            }
        }

        fn ok(self, url: &str, body: &[u8]) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), Ok(body.to_vec()));
            self
        }

        fn failing(self, url: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), Err(()));
            self
        }

        fn fail_all(&self) {
            for outcome in self.responses.lock().unwrap().values_mut() {
                *outcome = Err(());
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AssetFetcher for MockFetcher {
        async fn get(&self, url: &str) -> Result<AssetBody, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().unwrap().get(url) {
                Some(Ok(body)) => Ok(AssetBody {
                    body: body.clone(),
                    content_type: Some("text/plain".to_string()),
                }),
                _ => Err(FetchError::ServerError("mock failure".to_string())),
            }
        }
    }

    fn origin() -> Url {
        Url::parse("https://app.example.org").unwrap()
    }

    fn manifest(version: &str, assets: &[&str]) -> AssetManifest {
        AssetManifest {
            version: version.to_string(),
            assets: assets.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn spawn_worker(
        dir: &Path,
        manifest: AssetManifest,
        fetcher: Arc<MockFetcher>,
    ) -> AssetCacheHandle {
        AssetCacheManager::spawn(
            AssetCacheConfig::new(origin(), dir.to_path_buf()),
            manifest,
            Arc::new(MemoryStore::new()),
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_install_populates_version_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let asset = "https://app.example.org/app.js";
        let fetcher = Arc::new(MockFetcher::new().ok(asset, b"console.log(1)"));
        let handle = spawn_worker(tmp.path(), manifest("v1", &[asset]), fetcher);

        handle.install().await.unwrap();
        assert!(tmp.path().join("v1").is_dir());
        assert!(!tmp.path().join("v1.staging").exists());
    }

    #[tokio::test]
    async fn test_failed_install_leaves_previous_version_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("v1")).unwrap();

        let good = "https://app.example.org/app.js";
        let bad = "https://app.example.org/style.css";
        let fetcher = Arc::new(MockFetcher::new().ok(good, b"x").failing(bad));
        let handle = spawn_worker(tmp.path(), manifest("v2", &[good, bad]), fetcher);

        let err = handle.install().await.unwrap_err();
        assert!(matches!(err, AssetError::InstallAborted { .. }));
        assert!(tmp.path().join("v1").is_dir(), "previous version survives");
        assert!(!tmp.path().join("v2").exists());
        assert!(!tmp.path().join("v2.staging").exists(), "staging cleaned up");
    }

    #[tokio::test]
    async fn test_activate_keeps_only_current_version() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("v1")).unwrap();
        std::fs::create_dir_all(tmp.path().join("v2")).unwrap();

        let store = Arc::new(MemoryStore::new());
        let handle = AssetCacheManager::spawn(
            AssetCacheConfig::new(origin(), tmp.path().to_path_buf()),
            manifest("v3", &[]),
            Arc::clone(&store) as Arc<dyn LocalStore>,
            Arc::new(MockFetcher::new()),
        );
        let mut messages = handle.subscribe();

        handle.install().await.unwrap();
        let activated = handle.activate().await.unwrap();
        assert_eq!(activated, "v3");

        let remaining: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["v3".to_string()]);

        let marker = store.get(KEY_CACHE_VERSION_MARKER).await.unwrap().unwrap();
        assert_eq!(marker.value, Value::String("v3".to_string()));

        match messages.recv().await.unwrap() {
            WorkerMessage::VersionUpdated { version } => assert_eq!(version, "v3"),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(messages.try_recv().is_err(), "exactly one notification");
    }

    #[tokio::test]
    async fn test_non_get_and_foreign_origin_pass_through() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = spawn_worker(
            tmp.path(),
            manifest("v1", &[]),
            Arc::new(MockFetcher::new()),
        );

        let post = AssetRequest {
            method: Method::POST,
            url: Url::parse("https://app.example.org/api/ratings").unwrap(),
        };
        assert_eq!(
            handle.fetch(post).await.unwrap(),
            FetchResponse::NotIntercepted
        );

        let foreign = AssetRequest::get(Url::parse("https://tracker.example.net/pixel.gif").unwrap());
        assert_eq!(
            handle.fetch(foreign).await.unwrap(),
            FetchResponse::NotIntercepted
        );
    }

    #[tokio::test]
    async fn test_static_requests_are_cache_first() {
        let tmp = tempfile::tempdir().unwrap();
        let url = "https://app.example.org/logo.svg";
        let fetcher = Arc::new(MockFetcher::new().ok(url, b"<svg/>"));
        let handle = spawn_worker(tmp.path(), manifest("v1", &[]), Arc::clone(&fetcher));

        let request = AssetRequest::get(Url::parse(url).unwrap());
        match handle.fetch(request.clone()).await.unwrap() {
            FetchResponse::Network(body) => assert_eq!(body.body, b"<svg/>"),
            other => panic!("expected network miss, got {:?}", other),
        }

        // Second hit is served from cache without touching the network.
        match handle.fetch(request).await.unwrap() {
            FetchResponse::Cached(body) => {
                assert_eq!(body.body, b"<svg/>");
                assert_eq!(body.content_type.as_deref(), Some("text/plain"));
            }
            other => panic!("expected cached response, got {:?}", other),
        }
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_miss_populate_creates_version_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let url = "https://app.example.org/logo.svg";
        let fetcher = Arc::new(MockFetcher::new().ok(url, b"<svg/>"));
        // No install has run, so the version directory does not exist yet.
        let handle = spawn_worker(tmp.path(), manifest("v1", &[]), Arc::clone(&fetcher));

        let request = AssetRequest::get(Url::parse(url).unwrap());
        handle.fetch(request.clone()).await.unwrap();
        assert!(tmp.path().join("v1").is_dir());

        fetcher.fail_all();
        match handle.fetch(request).await.unwrap() {
            FetchResponse::Cached(body) => assert_eq!(body.body, b"<svg/>"),
            other => panic!("expected cached response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_font_hosts_are_allow_listed() {
        let tmp = tempfile::tempdir().unwrap();
        let url = "https://fonts.gstatic.com/s/roboto.woff2";
        let fetcher = Arc::new(MockFetcher::new().ok(url, b"font"));
        let handle = spawn_worker(tmp.path(), manifest("v1", &[]), Arc::clone(&fetcher));

        let request = AssetRequest::get(Url::parse(url).unwrap());
        assert!(matches!(
            handle.fetch(request).await.unwrap(),
            FetchResponse::Network(_)
        ));
    }

    #[tokio::test]
    async fn test_api_requests_are_network_first_with_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let url = "https://app.example.org/api/services";
        let fetcher = Arc::new(MockFetcher::new().ok(url, b"[]"));
        let handle = spawn_worker(tmp.path(), manifest("v1", &[]), Arc::clone(&fetcher));
        let request = AssetRequest::get(Url::parse(url).unwrap());

        // Online: live response wins and gets cached.
        assert!(matches!(
            handle.fetch(request.clone()).await.unwrap(),
            FetchResponse::Network(_)
        ));

        // Offline: most recent cached response for the exact URL.
        fetcher.fail_all();
        match handle.fetch(request).await.unwrap() {
            FetchResponse::Cached(body) => assert_eq!(body.body, b"[]"),
            other => panic!("expected cached fallback, got {:?}", other),
        }

        // Offline with nothing cached: failure propagates.
        let uncached =
            AssetRequest::get(Url::parse("https://app.example.org/api/categories").unwrap());
        assert!(matches!(
            handle.fetch(uncached).await.unwrap_err(),
            AssetError::Fetch { .. }
        ));
    }

    #[tokio::test]
    async fn test_reconnect_broadcasts_advisory_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let asset = "https://app.example.org/app.js";
        let fetcher = Arc::new(MockFetcher::new().ok(asset, b"x"));
        let handle = spawn_worker(tmp.path(), manifest("v1", &[asset]), fetcher);
        let mut messages = handle.subscribe();

        handle.reconnected().await.unwrap();

        assert!(matches!(
            messages.recv().await.unwrap(),
            WorkerMessage::BackgroundSyncStarted
        ));
        match messages.recv().await.unwrap() {
            WorkerMessage::CacheUpdated { data } => assert_eq!(data.version, "v1"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_worker_message_wire_format() {
        let message = WorkerMessage::VersionUpdated {
            version: "v7".to_string(),
        };
        let encoded = serde_json::to_value(&message).unwrap();
        assert_eq!(encoded["type"], "VERSION_UPDATED");
        assert_eq!(encoded["version"], "v7");

        let advisory = serde_json::to_value(WorkerMessage::BackgroundSyncStarted).unwrap();
        assert_eq!(advisory["type"], "BACKGROUND_SYNC_STARTED");
    }
}
