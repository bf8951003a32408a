//! Scheduled cache eviction.
//!
//! The janitor owns the recurring cleanup cadence: one pass every
//! configured interval, plus a final pass at shutdown. Cleanup is not
//! reentrant-safe (passes race on the same index files), so run exactly
//! one janitor per store and do not call `cleanup` manually while it is
//! running.

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::{CacheStore, CleanupReport};

/// Default entry age after which cleanup evicts: 7 days.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Periodic eviction driver for a cache store.
pub struct CacheJanitor {
    store: Arc<CacheStore>,
    max_age: Duration,
}

impl CacheJanitor {
    /// Create a janitor evicting entries older than `max_age`.
    pub fn new(store: Arc<CacheStore>, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    /// Create a janitor with the default 7-day retention.
    pub fn with_defaults(store: Arc<CacheStore>) -> Self {
        Self::new(store, Duration::days(DEFAULT_MAX_AGE_DAYS))
    }

    /// Run one cleanup pass across all levels.
    pub async fn run_once(&self) -> CleanupReport {
        let report = self.store.cleanup(self.max_age).await;
        if !report.failures.is_empty() {
            warn!(failures = report.failures.len(), "cleanup finished with level failures");
        }
        debug!(removed = report.total_removed(), "cleanup pass finished");
        report
    }

    /// Start the recurring schedule. The first pass runs after one full
    /// `period`; the returned handle triggers a final pass on shutdown.
    pub fn spawn(self, period: std::time::Duration) -> JanitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval fires immediately on the first tick; swallow it so
            // the first real pass happens after one period
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.run_once().await;
                        info!("{}", report.summary());
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_ok() {
                            let report = self.run_once().await;
                            info!("final cleanup: {}", report.summary());
                        }
                        break;
                    }
                }
            }
        });
        JanitorHandle { shutdown_tx, task }
    }
}

/// Handle to a running janitor schedule.
pub struct JanitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop the schedule, running one final cleanup pass first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheLevel;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_once_evicts_by_age() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()));
        store
            .store(CacheLevel::Raw, "stale", &[], None, None)
            .await
            .unwrap();

        let janitor = CacheJanitor::new(store.clone(), Duration::zero());
        let report = janitor.run_once().await;
        assert_eq!(report.total_removed(), 1);
        assert!(store.list_entries(CacheLevel::Raw).await.is_empty());
    }

    #[tokio::test]
    async fn test_defaults_keep_recent_entries() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()));
        store
            .store(CacheLevel::Raw, "fresh", &[], None, None)
            .await
            .unwrap();

        let janitor = CacheJanitor::with_defaults(store.clone());
        let report = janitor.run_once().await;
        assert_eq!(report.total_removed(), 0);
        assert_eq!(store.list_entries(CacheLevel::Raw).await.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_runs_final_pass() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()));
        store
            .store(CacheLevel::Raw, "evicted at shutdown", &[], None, None)
            .await
            .unwrap();

        let janitor = CacheJanitor::new(store.clone(), Duration::zero());
        // Period far beyond the test's lifetime: only the shutdown pass runs
        let handle = janitor.spawn(std::time::Duration::from_secs(3600));
        handle.shutdown().await;

        assert!(store.list_entries(CacheLevel::Raw).await.is_empty());
    }
}
