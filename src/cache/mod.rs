// ABOUTME: Key-value store abstraction with TTL backing sessions and cached answers
// ABOUTME: Pluggable backends (in-memory LRU, Redis) behind one provider trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Backend selection with in-memory fallback
pub mod factory;
/// In-memory LRU backend
pub mod memory;
/// Redis backend
pub mod redis;

pub use factory::Cache;

use crate::config::CacheConfig;
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cache provider trait for pluggable backend implementations
///
/// Values are stored as JSON. A stored value that no longer deserializes into
/// the requested type surfaces as `ErrorCode::SerializationError`, which lets
/// callers treat corrupt records as a miss.
///
/// # Examples
///
/// ```rust,no_run
/// use crm_voice_agent::cache::{CacheKey, CacheProvider};
/// use crm_voice_agent::cache::memory::InMemoryCache;
/// use crm_voice_agent::config::CacheConfig;
/// use std::time::Duration;
/// # async fn example() -> Result<(), crm_voice_agent::errors::AppError> {
/// let config = CacheConfig {
///     enable_background_cleanup: false,
///     ..Default::default()
/// };
/// let cache = InMemoryCache::new(config).await?;
///
/// let key = CacheKey::response("3f1c");
/// cache.set(&key, &"You have three open deals.", Duration::from_secs(300)).await?;
/// let cached: Option<String> = cache.get(&key).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait CacheProvider: Send + Sync + Clone {
    /// Create new cache instance with configuration
    ///
    /// # Errors
    ///
    /// Returns an error if cache initialization fails
    async fn new(config: CacheConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Store value with a TTL, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()>;

    /// Retrieve a value; expired entries read as `None`
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if the stored value does not deserialize,
    /// or a storage error if the backend fails
    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>>;

    /// Remove a single entry
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    async fn invalidate(&self, key: &CacheKey) -> AppResult<()>;

    /// Remaining TTL of a live entry
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>>;

    /// Verify the backend is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails
    async fn health_check(&self) -> AppResult<()>;

    /// Remove every entry owned by this service
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    async fn clear_all(&self) -> AppResult<()>;
}

/// What kind of record a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Conversation session keyed by client session id
    Session,
    /// Cached conversational answer keyed by content hash
    Response,
}

impl CacheNamespace {
    /// Key prefix for this namespace
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Response => "response",
        }
    }
}

/// Namespaced cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Record kind
    pub namespace: CacheNamespace,
    /// Identifier within the namespace
    pub id: String,
}

impl CacheKey {
    /// Key for a conversation session
    #[must_use]
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            namespace: CacheNamespace::Session,
            id: session_id.into(),
        }
    }

    /// Key for a cached answer
    #[must_use]
    pub fn response(hash: impl Into<String>) -> Self {
        Self {
            namespace: CacheNamespace::Response,
            id: hash.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.id)
    }
}
