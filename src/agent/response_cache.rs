// ABOUTME: Content-addressed short-TTL cache of answers to tool-free conversational turns
// ABOUTME: Keyed by a SHA-256 of the user, the normalized question and the page path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::cache::{Cache, CacheKey};
use crate::config::ResponseCacheConfig;
use crate::errors::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

/// Separator between hashed key parts; cannot appear in sanitized input
const KEY_SEPARATOR: char = '\u{1f}';

/// A cached answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    /// Full answer text
    pub response: String,
    /// Tier that produced it
    pub model: String,
    /// When it was stored
    pub cached_at: DateTime<Utc>,
}

/// Lowercase and collapse whitespace so trivially different phrasings share a key
#[must_use]
pub fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Hex SHA-256 of `(user_id, normalized question, page path)`
#[must_use]
pub fn response_cache_hash(user_id: &str, question: &str, page_path: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(KEY_SEPARATOR.to_string().as_bytes());
    hasher.update(normalize_question(question).as_bytes());
    hasher.update(KEY_SEPARATOR.to_string().as_bytes());
    hasher.update(page_path.unwrap_or("/").as_bytes());
    hex::encode(hasher.finalize())
}

/// Fast-path answer cache over the shared cache backend
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache,
    ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    /// Create a response cache
    #[must_use]
    pub fn new(cache: Cache, config: &ResponseCacheConfig) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(config.ttl_secs.max(1)),
            enabled: config.enabled,
        }
    }

    /// Whether lookups and stores do anything
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cached answer for this turn, if any
    ///
    /// Backend and decoding failures read as a miss.
    pub async fn lookup(
        &self,
        user_id: &str,
        question: &str,
        page_path: Option<&str>,
    ) -> Option<CachedResponse> {
        if !self.enabled {
            return None;
        }
        let key = CacheKey::response(response_cache_hash(user_id, question, page_path));
        match self.cache.get::<CachedResponse>(&key).await {
            Ok(hit) => {
                if hit.is_some() {
                    debug!(%key, "Response cache hit");
                }
                hit
            }
            Err(e) => {
                warn!(%key, error = %e, "Response cache lookup failed");
                None
            }
        }
    }

    /// Store an answer
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend rejects the write
    pub async fn store(
        &self,
        user_id: &str,
        question: &str,
        page_path: Option<&str>,
        response: &CachedResponse,
    ) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let key = CacheKey::response(response_cache_hash(user_id, question, page_path));
        self.cache.set(&key, response, self.ttl).await
    }
}
