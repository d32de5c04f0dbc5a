// ABOUTME: In-memory cache backend with LRU eviction, per-entry expiry and a sweep task
// ABOUTME: Single-process fallback when no Redis URL is configured or Redis is unreachable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{CacheKey, CacheProvider};
use crate::config::CacheConfig;
use crate::errors::AppResult;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::time;
use tracing::debug;

type Store = Arc<RwLock<LruCache<String, CacheEntry>>>;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory cache with LRU eviction and background expiry sweep
///
/// The store sits behind `Arc<RwLock<..>>` so the sweep task can share it.
/// Every operation takes the write lock because `LruCache::get` updates
/// recency.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Store,
    shutdown_tx: Option<Arc<mpsc::Sender<()>>>,
}

impl InMemoryCache {
    const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1_000) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Build the cache synchronously
    ///
    /// Spawns the sweep task when enabled, so it must run inside a Tokio runtime
    /// in that case.
    #[must_use]
    pub fn with_config(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(Self::FALLBACK_CAPACITY);
        let store: Store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = config.enable_background_cleanup.then(|| {
            let (tx, mut rx) = mpsc::channel::<()>(1);
            let sweep_store = Arc::clone(&store);
            let every = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = time::interval(every);
                loop {
                    tokio::select! {
                        _ = interval.tick() => Self::sweep_expired(&sweep_store).await,
                        _ = rx.recv() => {
                            debug!("Cache sweep task stopping");
                            break;
                        }
                    }
                }
            });

            Arc::new(tx)
        });

        Self { store, shutdown_tx }
    }

    async fn sweep_expired(store: &Store) {
        let now = Instant::now();
        let mut guard = store.write().await;
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            guard.pop(key);
        }
        drop(guard);

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Swept expired cache entries");
        }
    }

    /// Number of entries currently held, expired or not
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheProvider for InMemoryCache {
    async fn new(config: CacheConfig) -> AppResult<Self> {
        Ok(Self::with_config(&config))
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let entry = CacheEntry {
            data: serde_json::to_vec(value)?,
            expires_at: Instant::now() + ttl,
        };
        self.store.write().await.push(key.to_string(), entry);
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let key = key.to_string();
        let mut store = self.store.write().await;

        let bytes = match store.get(&key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                store.pop(&key);
                return Ok(None);
            }
            Some(entry) => entry.data.clone(),
            None => return Ok(None),
        };
        drop(store);

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        self.store.write().await.pop(&key.to_string());
        Ok(())
    }

    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        let store = self.store.read().await;
        Ok(store
            .peek(&key.to_string())
            .and_then(|entry| entry.expires_at.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero()))
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.store.write().await.clear();
        Ok(())
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        // Clones share the sender; the task only stops once the last one is gone
        if let Some(tx) = &self.shutdown_tx {
            if Arc::strong_count(tx) == 1 {
                let _ = tx.try_send(());
            }
        }
    }
}
