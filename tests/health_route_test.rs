// ABOUTME: Tests for the health endpoint and cross-origin headers on the router
// ABOUTME: Verifies backend reporting and the configured CORS origin policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{build_harness, test_config};
use crm_voice_agent::routes::router;
use helpers::axum_test::AxumTestRequest;
use serde_json::Value;

#[tokio::test]
async fn test_health_reports_memory_backends() {
    let harness = build_harness(None, test_config());

    let response = AxumTestRequest::get("/health")
        .send(router(harness.resources.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "crm-voice-agent");
    assert_eq!(body["backends"]["cache"], "memory");
    assert_eq!(body["backends"]["rateLimiter"], "memory");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_health_needs_no_credentials_or_provider() {
    let harness = build_harness(None, test_config());

    let response = AxumTestRequest::get("/health")
        .header("authorization", "Bearer not-a-real-token")
        .send(router(harness.resources.clone()))
        .await;

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_cors_allows_any_origin_when_unconfigured() {
    let harness = build_harness(None, test_config());

    let response = AxumTestRequest::get("/health")
        .header("origin", "https://anywhere.example")
        .send(router(harness.resources.clone()))
        .await;

    assert_eq!(
        response.header("access-control-allow-origin").as_deref(),
        Some("*")
    );
}

#[tokio::test]
async fn test_cors_echoes_only_listed_origins() {
    let mut config = test_config();
    config.cors_origins = vec!["https://crm.example".to_owned()];
    let harness = build_harness(None, config);

    let allowed = AxumTestRequest::get("/health")
        .header("origin", "https://crm.example")
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(
        allowed.header("access-control-allow-origin").as_deref(),
        Some("https://crm.example")
    );

    let denied = AxumTestRequest::get("/health")
        .header("origin", "https://evil.example")
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(denied.status(), 200);
    assert!(denied.header("access-control-allow-origin").is_none());
}
