// ABOUTME: Cache-related constants for TTL, capacity and cleanup intervals
// ABOUTME: Shared by the in-memory and Redis backends that hold sessions and cached answers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Default maximum entries for the in-memory backend
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default sweep interval for expired and idle entries
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60; // 1 minute

/// Cached conversational answer lifetime (5 minutes)
pub const RESPONSE_CACHE_TTL_SECS: u64 = 300;

/// Key prefix for namespacing in shared Redis instances
pub const CACHE_KEY_PREFIX: &str = "crm-voice:cache:";
