// ABOUTME: In-process two-window rate limiter over sharded concurrent maps
// ABOUTME: Adds a punitive block after the first short-window breach
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{ceil_secs, RateLimitBackend, RateLimitDecision, RateWindow};
use crate::config::RateLimitConfig;
use crate::errors::AppResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u32,
    reset_at: Instant,
}

/// Rate limiter for single-instance deployments
///
/// Counters live in a `DashMap` keyed `<window>:<identifier>`; the entry API
/// holds the shard lock across read-check-increment so each window update is
/// atomic. State is lost on restart and not shared between instances.
///
/// Once an identifier first exceeds the short window it is blocked outright
/// for `abuse_block_secs` (0 disables the block). The Redis backend has no
/// such block.
pub struct InMemoryRateLimiter {
    counters: DashMap<String, WindowState>,
    blocks: DashMap<String, Instant>,
    windows: [RateWindow; 2],
    abuse_block: Option<Duration>,
    cleanup_threshold: usize,
}

impl InMemoryRateLimiter {
    /// Create a limiter from configuration
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            counters: DashMap::new(),
            blocks: DashMap::new(),
            windows: RateWindow::pair(config),
            abuse_block: (config.abuse_block_secs > 0)
                .then(|| Duration::from_secs(config.abuse_block_secs)),
            cleanup_threshold: config.cleanup_threshold,
        }
    }

    /// Evaluate a request at an explicit instant
    #[must_use]
    pub fn check_at(&self, identifier: &str, now: Instant) -> RateLimitDecision {
        if let Some(until) = self.blocks.get(identifier).map(|b| *b) {
            if until > now {
                return RateLimitDecision::deny(
                    ceil_secs(until - now),
                    "Temporarily blocked after repeated rate limit violations",
                );
            }
            self.blocks.remove(identifier);
        }

        let mut remaining = u32::MAX;
        for (index, window) in self.windows.iter().enumerate() {
            match self.hit_window(window, identifier, now) {
                Ok(left) => remaining = remaining.min(left),
                Err(retry_after) => {
                    if index == 0 {
                        if let Some(block) = self.abuse_block {
                            warn!(identifier, "Short window exceeded, applying abuse block");
                            self.blocks.insert(identifier.to_owned(), now + block);
                            return RateLimitDecision::deny(
                                ceil_secs(block),
                                window.rejection_reason(),
                            );
                        }
                    }
                    return RateLimitDecision::deny(retry_after, window.rejection_reason());
                }
            }
        }

        if self.counters.len() > self.cleanup_threshold {
            self.cleanup(now);
        }

        RateLimitDecision::allow(remaining)
    }

    /// Count a hit against one window
    ///
    /// Returns the budget left on success, or the seconds until the window
    /// resets when it is full.
    fn hit_window(&self, window: &RateWindow, identifier: &str, now: Instant) -> Result<u32, u64> {
        let mut entry = self
            .counters
            .entry(format!("{}:{identifier}", window.name))
            .or_insert(WindowState {
                count: 0,
                reset_at: now + window.length,
            });
        let state = entry.value_mut();

        if now >= state.reset_at {
            *state = WindowState {
                count: 0,
                reset_at: now + window.length,
            };
        }

        if state.count >= window.limit {
            return Err(ceil_secs(state.reset_at - now));
        }

        state.count += 1;
        Ok(window.limit - state.count)
    }

    fn cleanup(&self, now: Instant) {
        self.counters.retain(|_, state| state.reset_at > now);
        self.blocks.retain(|_, until| *until > now);
    }

    /// Number of live counter entries
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }
}

#[async_trait]
impl RateLimitBackend for InMemoryRateLimiter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn check(&self, identifier: &str) -> AppResult<RateLimitDecision> {
        Ok(self.check_at(identifier, Instant::now()))
    }
}
