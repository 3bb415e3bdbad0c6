//! In-memory client directory with periodic refresh.

use std::{
    sync::{Arc, RwLock},
    time::{Duration, SystemTime},
};

use {
    keeperlink_config::DirectoryConfig,
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

use crate::{
    directory::{ClientRecord, DirectorySource},
    error::Result,
};

/// One complete directory fetch. Replaced wholesale, never edited.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    pub records: Vec<ClientRecord>,
    /// `None` until the first successful refresh.
    pub refreshed_at: Option<SystemTime>,
}

impl DirectorySnapshot {
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.refreshed_at.is_some()
    }
}

pub struct EntityCache {
    source: Arc<dyn DirectorySource>,
    snapshot: RwLock<Arc<DirectorySnapshot>>,
    search_limit: usize,
    empty_query_limit: usize,
}

impl EntityCache {
    pub fn new(source: Arc<dyn DirectorySource>, config: &DirectoryConfig) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(DirectorySnapshot::default())),
            search_limit: config.search_limit,
            empty_query_limit: config.empty_query_limit,
        }
    }

    /// Current snapshot. Cheap; readers never block a refresh for long.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Fetch the full directory and swap it in. On failure the previous
    /// snapshot stays in place and the error is returned.
    pub async fn refresh(&self) -> Result<usize> {
        match self.source.fetch_all().await {
            Ok(records) => {
                let count = records.len();
                let next = Arc::new(DirectorySnapshot {
                    records,
                    refreshed_at: Some(SystemTime::now()),
                });
                *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = next;
                info!(count, "client cache refreshed");
                Ok(count)
            },
            Err(e) => {
                warn!(error = %e, "client cache refresh failed, keeping previous snapshot");
                Err(e)
            },
        }
    }

    /// Entities matching `query`.
    ///
    /// Blank queries return the first entries in cache order. Otherwise a
    /// case-insensitive substring match on the name. An empty cache is
    /// refreshed first; if that fails the (empty) snapshot is searched.
    pub async fn list_entities(&self, query: Option<&str>) -> Vec<ClientRecord> {
        if !self.snapshot().is_populated() {
            debug!("client cache empty, refreshing before search");
            let _ = self.refresh().await;
        }
        let snapshot = self.snapshot();

        let query = query.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return snapshot
                .records
                .iter()
                .take(self.empty_query_limit)
                .cloned()
                .collect();
        }

        let needle = query.to_lowercase();
        snapshot
            .records
            .iter()
            .filter(|record| record.name.to_lowercase().contains(&needle))
            .take(self.search_limit)
            .cloned()
            .collect()
    }

    /// Refresh immediately and then on every `period` tick until the
    /// returned handle is aborted.
    pub fn spawn_refresh_loop(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // Failures are already logged and the old snapshot kept.
                let _ = cache.refresh().await;
            }
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::error::Error,
        async_trait::async_trait,
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    /// Returns queued results in order, then repeats the last one.
    struct ScriptedSource {
        results: Mutex<Vec<Result<Vec<ClientRecord>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(results: Vec<Result<Vec<ClientRecord>>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DirectorySource for ScriptedSource {
        async fn fetch_all(&self) -> Result<Vec<ClientRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            if results.len() > 1 {
                return results.remove(0);
            }
            match results.first() {
                Some(Ok(records)) => Ok(records.clone()),
                _ => Err(Error::PaginationExhausted),
            }
        }
    }

    fn record(id: usize, name: &str) -> ClientRecord {
        ClientRecord {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn many(n: usize) -> Vec<ClientRecord> {
        (0..n).map(|i| record(i, &format!("Client {i}"))).collect()
    }

    fn cache(source: Arc<ScriptedSource>) -> EntityCache {
        EntityCache::new(source, &DirectoryConfig::default())
    }

    #[tokio::test]
    async fn first_search_populates_cache() {
        let source = ScriptedSource::new(vec![Ok(vec![
            record(1, "Acme Corp"),
            record(2, "Globex"),
        ])]);
        let cache = cache(source.clone());

        let found = cache.list_entities(Some("acme")).await;
        assert_eq!(found, vec![record(1, "Acme Corp")]);

        cache.list_entities(Some("glob")).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_query_returns_first_fifty() {
        let cache = cache(ScriptedSource::new(vec![Ok(many(120))]));
        let found = cache.list_entities(Some("   ")).await;
        assert_eq!(found.len(), 50);
        assert_eq!(found[0].id, "0");
        assert_eq!(cache.list_entities(None).await.len(), 50);
    }

    #[tokio::test]
    async fn matches_are_capped() {
        let cache = cache(ScriptedSource::new(vec![Ok(many(250))]));
        assert_eq!(cache.list_entities(Some("CLIENT")).await.len(), 100);
        assert_eq!(cache.list_entities(Some("client 12")).await.len(), 11);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let source = ScriptedSource::new(vec![
            Ok(vec![record(1, "Acme")]),
            Err(Error::PaginationExhausted),
        ]);
        let cache = cache(source);

        assert_eq!(cache.refresh().await.unwrap(), 1);
        let before = cache.snapshot().refreshed_at;
        assert!(cache.refresh().await.is_err());

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.records, vec![record(1, "Acme")]);
        assert_eq!(snapshot.refreshed_at, before);
    }

    #[tokio::test]
    async fn failed_first_refresh_yields_empty_result() {
        let cache = cache(ScriptedSource::new(vec![Err(Error::PaginationExhausted)]));
        assert!(cache.list_entities(Some("x")).await.is_empty());
        assert!(!cache.snapshot().is_populated());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_loop_ticks() {
        let source = ScriptedSource::new(vec![Ok(many(3))]);
        let cache = Arc::new(cache(source.clone()));

        let handle = cache.spawn_refresh_loop(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(121)).await;
        handle.abort();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.snapshot().records.len(), 3);
    }
}
