// ABOUTME: Default request budgets for the short burst and long sustained windows
// ABOUTME: Plus the punitive block applied by the in-process limiter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Requests allowed in the short window
pub const SHORT_WINDOW_LIMIT: u32 = 30;

/// Short window length in seconds
pub const SHORT_WINDOW_SECS: u64 = 60;

/// Requests allowed in the long window
pub const LONG_WINDOW_LIMIT: u32 = 300;

/// Long window length in seconds
pub const LONG_WINDOW_SECS: u64 = 3_600;

/// Block applied on the first short-window breach (one hour)
pub const ABUSE_BLOCK_SECS: u64 = 3_600;

/// Entry count above which stale counters are swept
pub const CLEANUP_THRESHOLD: usize = 10_000;
