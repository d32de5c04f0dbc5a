// ABOUTME: Two-window request rate limiting with pluggable in-process and Redis backends
// ABOUTME: Facade used by HTTP handlers for pre-auth IP and post-auth per-user budgets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Rate Limiting
//!
//! Every identifier gets two fixed windows: a short burst window and a long
//! sustained window. The short window is evaluated first and a rejection
//! there short-circuits, so a long-window rejection is only observable once
//! the short window has room.
//!
//! The limiter is identifier-agnostic. Callers compose identifiers, e.g. the
//! raw client IP before authentication and `voice:<user>:<ip>` after it.

/// In-process backend
pub mod memory;
/// Redis backend
pub mod redis;

pub use memory::InMemoryRateLimiter;
pub use redis::RedisRateLimiter;

use crate::config::{CacheConfig, RateLimitConfig};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Header carrying the smallest remaining budget across both windows
pub const X_RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
/// Standard retry header, in seconds
pub const RETRY_AFTER: &str = "Retry-After";

/// One counting window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Label used in storage keys
    pub name: &'static str,
    /// Requests allowed per window
    pub limit: u32,
    /// Window length
    pub length: Duration,
}

impl RateWindow {
    /// Short then long window, in evaluation order
    #[must_use]
    pub const fn pair(config: &RateLimitConfig) -> [Self; 2] {
        [
            Self {
                name: "short",
                limit: config.short_limit,
                length: Duration::from_secs(config.short_window_secs),
            },
            Self {
                name: "long",
                limit: config.long_limit,
                length: Duration::from_secs(config.long_window_secs),
            },
        ]
    }

    /// Human-readable rejection reason for this window
    #[must_use]
    pub fn rejection_reason(&self) -> String {
        format!(
            "Rate limit exceeded: {} requests per {} seconds",
            self.limit,
            self.length.as_secs()
        )
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Smallest remaining budget across the evaluated windows
    pub remaining: u32,
    /// Seconds to wait before retrying; 0 when allowed
    pub retry_after: u64,
    /// Why the request was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RateLimitDecision {
    /// Admit a request
    #[must_use]
    pub const fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after: 0,
            reason: None,
        }
    }

    /// Reject a request
    #[must_use]
    pub fn deny(retry_after: u64, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after: retry_after.max(1),
            reason: Some(reason.into()),
        }
    }
}

/// Whole seconds until `remaining` elapses, rounded up, at least 1
#[must_use]
pub fn ceil_secs(remaining: Duration) -> u64 {
    let whole = remaining.as_secs();
    let secs = if remaining.subsec_nanos() > 0 {
        whole + 1
    } else {
        whole
    };
    secs.max(1)
}

/// Storage backend for rate limit counters
///
/// Implementations must make the read-check-increment of each window atomic so
/// two concurrent requests cannot both take the last slot.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Backend label for logs
    fn name(&self) -> &'static str;

    /// Count one request against `identifier` and decide whether it may proceed
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable
    async fn check(&self, identifier: &str) -> AppResult<RateLimitDecision>;
}

/// Shared rate limiter handle
#[derive(Clone)]
pub struct RateLimiter {
    backend: Arc<dyn RateLimitBackend>,
}

impl RateLimiter {
    /// Wrap an explicit backend
    #[must_use]
    pub fn new(backend: Arc<dyn RateLimitBackend>) -> Self {
        Self { backend }
    }

    /// In-process limiter
    #[must_use]
    pub fn in_memory(config: &RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryRateLimiter::new(config)))
    }

    /// Redis-backed limiter when a Redis URL is configured and reachable,
    /// otherwise the in-process limiter
    pub async fn from_config(cache: &CacheConfig, config: &RateLimitConfig) -> Self {
        if let Some(url) = cache.redis_url.as_deref() {
            match RedisRateLimiter::connect(url, &cache.redis_connection, config).await {
                Ok(limiter) => return Self::new(Arc::new(limiter)),
                Err(e) => warn!(
                    error = %e,
                    "Redis unavailable, falling back to in-process rate limiting"
                ),
            }
        }
        info!("Using in-process rate limiter");
        Self::in_memory(config)
    }

    /// Backend label for logs
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Check an identifier, failing open if the backend is unreachable
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        match self.backend.check(identifier).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "Rate limit backend failed, admitting request"
                );
                RateLimitDecision::allow(0)
            }
        }
    }

    /// Check an identifier and convert a rejection into a 429 error
    ///
    /// # Errors
    ///
    /// Returns `RateLimitExceeded` carrying the retry-after when rejected
    pub async fn enforce(&self, identifier: &str) -> AppResult<RateLimitDecision> {
        let decision = self.check(identifier).await;
        if decision.allowed {
            return Ok(decision);
        }
        AppLogger::log_rate_limited(identifier, decision.retry_after, decision.reason.as_deref());
        Err(AppError::rate_limited(
            decision.retry_after,
            decision.reason.as_deref(),
        ))
    }
}

/// Response headers describing a decision
#[must_use]
pub fn rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    if !decision.allowed {
        headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_rounds_partial_seconds_up() {
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::ZERO), 1);
        assert_eq!(ceil_secs(Duration::from_millis(59_001)), 60);
        assert_eq!(ceil_secs(Duration::from_secs(60)), 60);
    }

    #[test]
    fn headers_include_retry_after_only_when_denied() {
        let allowed = rate_limit_headers(&RateLimitDecision::allow(12));
        assert_eq!(allowed[X_RATE_LIMIT_REMAINING], "12");
        assert!(allowed.get(RETRY_AFTER).is_none());

        let denied = rate_limit_headers(&RateLimitDecision::deny(42, "slow down"));
        assert_eq!(denied[RETRY_AFTER], "42");
    }
}
