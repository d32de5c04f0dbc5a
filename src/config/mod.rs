// ABOUTME: Configuration module tree for the voice agent server
// ABOUTME: Environment-only configuration, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration.
//!
//! Every setting has a default from `crate::constants`, so the server starts
//! with nothing but an LLM API key exported.

/// Cache, session, rate limit and Redis configuration
pub mod cache;
/// Top-level server configuration and collaborator endpoints
pub mod environment;

pub use cache::{
    CacheConfig, RateLimitConfig, RedisConnectionConfig, ResponseCacheConfig, SessionConfig,
};
pub use environment::{CollaboratorConfig, Environment, LlmConfig, ServerConfig, SpeechConfig};

use std::env;
use std::str::FromStr;

/// Parse an environment variable, falling back to `default` when unset or malformed
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a non-empty environment variable
pub(crate) fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
