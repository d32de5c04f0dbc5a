// ABOUTME: Re-exports domain constants from the core crate
// ABOUTME: Limits, rate-limit windows, session TTLs, cache and model defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain constants, re-exported from `crm-voice-core`.

pub use crm_voice_core::constants::*;
