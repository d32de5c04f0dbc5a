// ABOUTME: Redis-backed two-window rate limiter for multi-instance deployments
// ABOUTME: One Lua script per window makes check-and-increment atomic on the server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{ceil_secs, RateLimitBackend, RateLimitDecision, RateWindow};
use crate::cache::redis::connect_manager;
use crate::config::{RateLimitConfig, RedisConnectionConfig};
use crate::constants::redis::RATE_LIMIT_KEY_PREFIX;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;
use tracing::info;

/// Returns `{admitted, count, ttl_ms}`; the key expiring is what resets a window
const WINDOW_SCRIPT: &str = r"
local limit = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= limit then
  return {0, current, redis.call('PTTL', KEYS[1])}
end
current = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], window_ms)
  ttl = window_ms
end
return {1, current, ttl}
";

/// Rate limiter sharing counters across instances through Redis
///
/// There is no punitive block here; a rejected identifier is admitted again
/// as soon as the full window expires.
pub struct RedisRateLimiter {
    manager: ConnectionManager,
    script: Script,
    windows: [RateWindow; 2],
}

impl RedisRateLimiter {
    /// Connect and build the limiter
    ///
    /// # Errors
    ///
    /// Returns an error if Redis cannot be reached
    pub async fn connect(
        redis_url: &str,
        conn_config: &RedisConnectionConfig,
        config: &RateLimitConfig,
    ) -> AppResult<Self> {
        let manager = connect_manager(redis_url, conn_config).await?;
        info!("Redis rate limiter connected");
        Ok(Self {
            manager,
            script: Script::new(WINDOW_SCRIPT),
            windows: RateWindow::pair(config),
        })
    }

    async fn hit_window(
        &self,
        window: &RateWindow,
        identifier: &str,
    ) -> AppResult<(bool, u32, Duration)> {
        let key = format!("{RATE_LIMIT_KEY_PREFIX}{}:{identifier}", window.name);
        let window_ms = u64::try_from(window.length.as_millis()).unwrap_or(u64::MAX);
        let mut conn = self.manager.clone();

        let (admitted, count, ttl_ms): (i64, i64, i64) = self
            .script
            .key(&key)
            .arg(window.limit)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::storage(format!("Rate limit script failed: {e}")))?;

        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let ttl = Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(window_ms));
        Ok((admitted == 1, window.limit.saturating_sub(count), ttl))
    }
}

#[async_trait]
impl RateLimitBackend for RedisRateLimiter {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self, identifier: &str) -> AppResult<RateLimitDecision> {
        let mut remaining = u32::MAX;
        for window in &self.windows {
            let (admitted, left, ttl) = self.hit_window(window, identifier).await?;
            if !admitted {
                return Ok(RateLimitDecision::deny(
                    ceil_secs(ttl),
                    window.rejection_reason(),
                ));
            }
            remaining = remaining.min(left);
        }
        Ok(RateLimitDecision::allow(remaining))
    }
}
