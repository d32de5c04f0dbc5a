// ABOUTME: Cache, session, response cache and rate limiting configuration types
// ABOUTME: Handles Redis connection retry settings and the two-window request budgets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{env_non_empty, env_or};
use crate::constants::{cache, rate_limits, redis, session};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backing store configuration shared by sessions and the response cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL for the durable backend; in-memory when absent
    pub redis_url: Option<String>,
    /// Maximum number of entries in the in-memory backend
    pub max_entries: usize,
    /// Sweep interval for expired entries
    pub cleanup_interval: Duration,
    /// Spawn the background sweep (disable in tests to avoid runtime conflicts)
    pub enable_background_cleanup: bool,
    /// Redis connection configuration
    pub redis_connection: RedisConnectionConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            max_entries: cache::DEFAULT_CACHE_MAX_ENTRIES,
            cleanup_interval: Duration::from_secs(cache::DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
            redis_connection: RedisConnectionConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Load cache configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            redis_url: env_non_empty("REDIS_URL"),
            max_entries: env_or("CACHE_MAX_ENTRIES", cache::DEFAULT_CACHE_MAX_ENTRIES),
            cleanup_interval: Duration::from_secs(env_or(
                "CACHE_CLEANUP_INTERVAL_SECS",
                cache::DEFAULT_CLEANUP_INTERVAL_SECS,
            )),
            enable_background_cleanup: true,
            redis_connection: RedisConnectionConfig::from_env(),
        }
    }
}

/// Redis connection and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfig {
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Response/command timeout in seconds
    pub response_timeout_secs: u64,
    /// Number of reconnection retries after connection drop
    pub reconnection_retries: usize,
    /// Exponential backoff base for retry delays
    pub retry_exponent_base: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Number of retries for initial connection at startup
    pub initial_connection_retries: u32,
    /// Initial retry delay in milliseconds (doubles with exponential backoff)
    pub initial_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: redis::CONNECTION_TIMEOUT_SECS,
            response_timeout_secs: redis::RESPONSE_TIMEOUT_SECS,
            reconnection_retries: redis::RECONNECTION_RETRIES,
            retry_exponent_base: redis::RETRY_EXPONENT_BASE,
            max_retry_delay_ms: redis::MAX_RETRY_DELAY_MS,
            initial_connection_retries: redis::INITIAL_CONNECTION_RETRIES,
            initial_retry_delay_ms: redis::INITIAL_RETRY_DELAY_MS,
        }
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            connection_timeout_secs: env_or(
                "REDIS_CONNECTION_TIMEOUT_SECS",
                redis::CONNECTION_TIMEOUT_SECS,
            ),
            response_timeout_secs: env_or(
                "REDIS_RESPONSE_TIMEOUT_SECS",
                redis::RESPONSE_TIMEOUT_SECS,
            ),
            reconnection_retries: env_or("REDIS_RECONNECTION_RETRIES", redis::RECONNECTION_RETRIES),
            retry_exponent_base: env_or("REDIS_RETRY_EXPONENT_BASE", redis::RETRY_EXPONENT_BASE),
            max_retry_delay_ms: env_or("REDIS_MAX_RETRY_DELAY_MS", redis::MAX_RETRY_DELAY_MS),
            initial_connection_retries: env_or(
                "REDIS_INITIAL_CONNECTION_RETRIES",
                redis::INITIAL_CONNECTION_RETRIES,
            ),
            initial_retry_delay_ms: env_or(
                "REDIS_INITIAL_RETRY_DELAY_MS",
                redis::INITIAL_RETRY_DELAY_MS,
            ),
        }
    }
}

/// Two-window rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed in the short (burst) window
    pub short_limit: u32,
    /// Short window length in seconds
    pub short_window_secs: u64,
    /// Requests allowed in the long (sustained) window
    pub long_limit: u32,
    /// Long window length in seconds
    pub long_window_secs: u64,
    /// Punitive block after the first short-window breach; 0 disables it
    pub abuse_block_secs: u64,
    /// Entry count above which the in-process limiter sweeps stale counters
    pub cleanup_threshold: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            short_limit: rate_limits::SHORT_WINDOW_LIMIT,
            short_window_secs: rate_limits::SHORT_WINDOW_SECS,
            long_limit: rate_limits::LONG_WINDOW_LIMIT,
            long_window_secs: rate_limits::LONG_WINDOW_SECS,
            abuse_block_secs: rate_limits::ABUSE_BLOCK_SECS,
            cleanup_threshold: rate_limits::CLEANUP_THRESHOLD,
        }
    }
}

impl RateLimitConfig {
    /// Load rate limit configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            short_limit: env_or("RATE_LIMIT_SHORT_LIMIT", rate_limits::SHORT_WINDOW_LIMIT),
            short_window_secs: env_or(
                "RATE_LIMIT_SHORT_WINDOW_SECS",
                rate_limits::SHORT_WINDOW_SECS,
            ),
            long_limit: env_or("RATE_LIMIT_LONG_LIMIT", rate_limits::LONG_WINDOW_LIMIT),
            long_window_secs: env_or("RATE_LIMIT_LONG_WINDOW_SECS", rate_limits::LONG_WINDOW_SECS),
            abuse_block_secs: env_or("RATE_LIMIT_ABUSE_BLOCK_SECS", rate_limits::ABUSE_BLOCK_SECS),
            cleanup_threshold: env_or(
                "RATE_LIMIT_CLEANUP_THRESHOLD",
                rate_limits::CLEANUP_THRESHOLD,
            ),
        }
    }
}

/// Conversation session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute lifetime from session creation, in seconds
    pub ttl_secs: u64,
    /// Maximum retained non-system messages
    pub max_messages: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: session::SESSION_TTL_SECS,
            max_messages: session::MAX_CONVERSATION_MESSAGES,
        }
    }
}

impl SessionConfig {
    /// Load session configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            ttl_secs: env_or("SESSION_TTL_SECS", session::SESSION_TTL_SECS),
            max_messages: env_or("SESSION_MAX_MESSAGES", session::MAX_CONVERSATION_MESSAGES),
        }
    }

    /// Session lifetime as a `Duration`
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Fast-path answer cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCacheConfig {
    /// Whether tool-free answers are cached
    pub enabled: bool,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: cache::RESPONSE_CACHE_TTL_SECS,
        }
    }
}

impl ResponseCacheConfig {
    /// Load response cache configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            enabled: env_or("RESPONSE_CACHE_ENABLED", true),
            ttl_secs: env_or("RESPONSE_CACHE_TTL_SECS", cache::RESPONSE_CACHE_TTL_SECS),
        }
    }
}
