// ABOUTME: Re-exports the unified error types from the core crate
// ABOUTME: Keeps `crate::errors::AppError` paths stable across the server modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Unified error handling, re-exported from `crm-voice-core`.

pub use crm_voice_core::errors::*;
