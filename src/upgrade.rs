//! Upgrade coordination.
//!
//! Consumes [`WorkerMessage`]s from the asset cache worker. A `VersionUpdated`
//! message means a new asset set is active; running old code against it has no
//! compatibility guarantee, so the only correct reaction is a full reload.
//! The reload fires at most once per coordinator: a second activation racing
//! the first changes nothing, because the reload replaces the process anyway.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assets::WorkerMessage;

/// Forces the hosting application to restart into the new version.
pub trait Reloader: Send + Sync {
    fn reload(&self);
}

impl<T: Reloader + ?Sized> Reloader for std::sync::Arc<T> {
    fn reload(&self) {
        (**self).reload()
    }
}

pub struct UpgradeCoordinator;

impl UpgradeCoordinator {
    /// Spawn the message consumer. The task ends when the worker side of the
    /// channel is dropped.
    pub fn spawn<R: Reloader + 'static>(
        mut messages: broadcast::Receiver<WorkerMessage>,
        reloader: R,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut reloaded = false;
            loop {
                match messages.recv().await {
                    Ok(WorkerMessage::VersionUpdated { version }) => {
                        if reloaded {
                            debug!(version = %version, "reload already triggered, ignoring");
                            continue;
                        }
                        info!(version = %version, "new cache version active, forcing full reload");
                        reloaded = true;
                        reloader.reload();
                    }
                    Ok(WorkerMessage::BackgroundSyncStarted) => {
                        debug!("background sync started");
                    }
                    Ok(WorkerMessage::CacheUpdated { data }) => {
                        // Advisory only; freshness is the sync coordinator's call.
                        debug!(version = %data.version, "advisory cache update received");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed worker messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::CacheUpdatedData;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingReloader {
        reloads: AtomicUsize,
    }

    impl Reloader for CountingReloader {
        fn reload(&self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_version_update_triggers_reload_at_most_once() {
        let (tx, rx) = broadcast::channel(8);
        let reloader = Arc::new(CountingReloader::default());
        let task = UpgradeCoordinator::spawn(rx, Arc::clone(&reloader));

        // Two activations queued back to back, before the first is handled.
        tx.send(WorkerMessage::VersionUpdated {
            version: "v2".to_string(),
        })
        .unwrap();
        tx.send(WorkerMessage::VersionUpdated {
            version: "v3".to_string(),
        })
        .unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloader.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_advisory_messages_do_not_reload() {
        let (tx, rx) = broadcast::channel(8);
        let reloader = Arc::new(CountingReloader::default());
        let task = UpgradeCoordinator::spawn(rx, Arc::clone(&reloader));

        tx.send(WorkerMessage::BackgroundSyncStarted).unwrap();
        tx.send(WorkerMessage::CacheUpdated {
            data: CacheUpdatedData {
                timestamp: Utc::now(),
                version: "v1".to_string(),
            },
        })
        .unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloader.reloads.load(Ordering::SeqCst), 0);
    }
}
