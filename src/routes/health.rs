// ABOUTME: Health check route reporting service identity and backend selection
// ABOUTME: Used by load balancers; never touches the model provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::service_names::CRM_VOICE_AGENT;
use crate::resources::ServerResources;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .with_state(resources)
    }

    async fn health(State(resources): State<Arc<ServerResources>>) -> Json<Value> {
        let cache_ok = resources.cache.health_check().await.is_ok();
        Json(json!({
            "status": if cache_ok { "ok" } else { "degraded" },
            "service": CRM_VOICE_AGENT,
            "version": env!("CARGO_PKG_VERSION"),
            "backends": {
                "cache": resources.cache.backend_name(),
                "rateLimiter": resources.rate_limiter.backend_name(),
            },
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}
