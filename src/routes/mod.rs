// ABOUTME: HTTP router assembly for the voice agent server
// ABOUTME: Merges domain routes and applies tracing, CORS and body-size layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Health check route
pub mod health;
/// Chat, speech and session routes
pub mod voice;

pub use health::HealthRoutes;
pub use voice::VoiceRoutes;

use crate::constants::limits::MAX_AUDIO_BYTES;
use crate::middleware::setup_cors;
use crate::resources::ServerResources;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Request bodies above this are refused before any handler runs
pub const MAX_BODY_BYTES: usize = MAX_AUDIO_BYTES + 64 * 1024;

/// Build the full application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config);
    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(VoiceRoutes::routes(resources))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
