// ABOUTME: Redis cache backend for multi-instance deployments
// ABOUTME: Connection manager with startup retry, SET EX writes and a namespaced key prefix
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{CacheKey, CacheProvider};
use crate::config::{CacheConfig, RedisConnectionConfig};
use crate::constants::cache::CACHE_KEY_PREFIX;
use crate::errors::{AppError, AppResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Redis cache with automatic reconnection
///
/// Keys are prefixed with `CACHE_KEY_PREFIX` so a shared Redis instance can
/// be cleared without touching other tenants' data.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect using the cache configuration
    ///
    /// # Errors
    ///
    /// Returns an error if no URL is configured or every connection attempt fails
    pub async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| AppError::config("Redis URL is required for the Redis cache backend"))?;
        let manager = connect_manager(redis_url, &config.redis_connection).await?;
        info!("Redis cache backend connected");
        Ok(Self { manager })
    }

    fn build_key(key: &CacheKey) -> String {
        format!("{CACHE_KEY_PREFIX}{key}")
    }

    fn storage_error(op: &str, e: &redis::RedisError) -> AppError {
        error!("Redis {op} failed: {e}");
        AppError::storage(format!("Cache {op} failed: {e}"))
    }
}

/// Open a Redis connection manager, retrying the first connection with backoff
///
/// Shared with the Redis rate limiter.
///
/// # Errors
///
/// Returns an error if the URL is invalid or all attempts fail
pub async fn connect_manager(
    redis_url: &str,
    conn_config: &RedisConnectionConfig,
) -> AppResult<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;

    let manager_config = ConnectionManagerConfig::new()
        .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
        .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs))
        .set_number_of_retries(conn_config.reconnection_retries)
        .set_exponent_base(conn_config.retry_exponent_base)
        .set_max_delay(conn_config.max_retry_delay_ms);

    let attempts = conn_config.initial_connection_retries + 1;
    let mut delay_ms = conn_config.initial_retry_delay_ms;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
            Ok(manager) => return Ok(manager),
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    warn!("Redis connection attempt {attempt}/{attempts} failed, retrying in {delay_ms}ms: {e}");
                    sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = delay_ms.saturating_mul(2).min(conn_config.max_retry_delay_ms);
                }
            }
        }
    }

    Err(AppError::storage(format!(
        "Failed to connect to Redis after {attempts} attempts: {last_error}"
    )))
}

#[async_trait::async_trait]
impl CacheProvider for RedisCache {
    async fn new(config: CacheConfig) -> AppResult<Self> {
        Self::connect(&config).await
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let serialized = serde_json::to_vec(value)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::build_key(key), serialized, ttl.as_secs().max(1))
            .await
            .map_err(|e| Self::storage_error("SET", &e))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut conn = self.manager.clone();
        let data: Option<Vec<u8>> = conn
            .get(Self::build_key(key))
            .await
            .map_err(|e| Self::storage_error("GET", &e))?;

        data.map(|bytes| serde_json::from_slice(&bytes).map_err(AppError::from))
            .transpose()
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(Self::build_key(key))
            .await
            .map_err(|e| Self::storage_error("DEL", &e))
    }

    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        let mut conn = self.manager.clone();
        let secs: i64 = conn
            .ttl(Self::build_key(key))
            .await
            .map_err(|e| Self::storage_error("TTL", &e))?;

        // -2 missing, -1 no expiry
        Ok(u64::try_from(secs)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs))
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("PING", &e))?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(AppError::storage(format!("Unexpected PING response '{pong}'")))
        }
    }

    async fn clear_all(&self) -> AppResult<()> {
        let pattern = format!("{CACHE_KEY_PREFIX}*");
        let mut conn = self.manager.clone();
        let mut cursor = 0_u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| Self::storage_error("SCAN", &e))?;

            if !keys.is_empty() {
                conn.del::<_, ()>(&keys)
                    .await
                    .map_err(|e| Self::storage_error("DEL", &e))?;
            }

            cursor = next;
            if cursor == 0 {
                return Ok(());
            }
        }
    }
}
