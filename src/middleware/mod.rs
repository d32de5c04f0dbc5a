// ABOUTME: HTTP middleware for CORS and per-request context extraction
// ABOUTME: Client IP, credentials and request ids are read once from the inbound headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Cross-origin configuration
pub mod cors;
/// Request context from headers
pub mod request;

pub use cors::setup_cors;
pub use request::{client_ip, request_credentials, RequestContext};
