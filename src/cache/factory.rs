// ABOUTME: Cache factory selecting the Redis or in-memory backend from configuration
// ABOUTME: Falls back to the in-memory backend when Redis is configured but unreachable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::memory::InMemoryCache;
use super::redis::RedisCache;
use super::{CacheKey, CacheProvider};
use crate::config::CacheConfig;
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Unified cache handle over the available backends
#[derive(Clone)]
pub enum Cache {
    /// Process-local store
    Memory(InMemoryCache),
    /// Shared Redis store
    Redis(RedisCache),
}

impl Cache {
    /// Create the configured backend
    ///
    /// With `redis_url` set this connects to Redis; if that fails the error is
    /// logged and the in-memory backend is used instead, so a Redis outage at
    /// startup degrades to single-instance behavior rather than refusing to boot.
    pub async fn new(config: CacheConfig) -> Self {
        if config.redis_url.is_some() {
            match RedisCache::connect(&config).await {
                Ok(redis) => return Self::Redis(redis),
                Err(e) => warn!(
                    error = %e,
                    "Redis unavailable, falling back to in-memory session store"
                ),
            }
        }

        info!(
            max_entries = config.max_entries,
            "Initializing in-memory cache backend"
        );
        Self::Memory(InMemoryCache::with_config(&config))
    }

    /// In-memory backend without a sweep task, for tests and tools
    #[must_use]
    pub fn in_memory(max_entries: usize) -> Self {
        Self::Memory(InMemoryCache::with_config(&CacheConfig {
            max_entries,
            enable_background_cleanup: false,
            ..CacheConfig::default()
        }))
    }

    /// Backend label for logs and health output
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }

    /// Store value in cache with TTL
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails
    pub async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        match self {
            Self::Memory(c) => c.set(key, value, ttl).await,
            Self::Redis(c) => c.set(key, value, ttl).await,
        }
    }

    /// Retrieve value from cache
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization or the backend fails
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        match self {
            Self::Memory(c) => c.get(key).await,
            Self::Redis(c) => c.get(key).await,
        }
    }

    /// Remove single cache entry
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        match self {
            Self::Memory(c) => c.invalidate(key).await,
            Self::Redis(c) => c.invalidate(key).await,
        }
    }

    /// Remaining TTL of a live entry
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        match self {
            Self::Memory(c) => c.ttl(key).await,
            Self::Redis(c) => c.ttl(key).await,
        }
    }

    /// Verify the backend is healthy
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails
    pub async fn health_check(&self) -> AppResult<()> {
        match self {
            Self::Memory(c) => c.health_check().await,
            Self::Redis(c) => c.health_check().await,
        }
    }

    /// Clear all entries
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn clear_all(&self) -> AppResult<()> {
        match self {
            Self::Memory(c) => c.clear_all().await,
            Self::Redis(c) => c.clear_all().await,
        }
    }
}
