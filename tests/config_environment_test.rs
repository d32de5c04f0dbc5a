// ABOUTME: Tests for environment-driven server configuration loading
// ABOUTME: Covers defaults, overrides, required collaborator endpoints and the startup summary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use crm_voice_agent::config::{Environment, LlmConfig, ServerConfig, SpeechConfig};
use crm_voice_agent::constants::{llm, rate_limits};
use crm_voice_agent::llm::ModelTier;
use serial_test::serial;
use std::env;

const MANAGED_VARS: &[&str] = &[
    "CRM_API_URL",
    "AUTH_API_URL",
    "CRM_SERVICE_KEY",
    "ENVIRONMENT",
    "HTTP_PORT",
    "CORS_ALLOWED_ORIGINS",
    "LLM_BASE_URL",
    "LLM_API_KEY",
    "OPENAI_API_KEY",
    "LLM_MODEL_FAST",
    "LLM_MODEL_STANDARD",
    "LLM_MODEL_REASONING",
    "LLM_MAX_TOOL_ROUNDS",
    "SPEECH_BASE_URL",
    "SPEECH_API_KEY",
    "REDIS_URL",
    "RATE_LIMIT_SHORT_LIMIT",
    "SESSION_TTL_SECS",
    "RESPONSE_CACHE_ENABLED",
];

fn clear_env() {
    for key in MANAGED_VARS {
        env::remove_var(key);
    }
}

fn set_required() {
    env::set_var("CRM_API_URL", "http://crm.internal");
    env::set_var("AUTH_API_URL", "http://auth.internal");
}

#[test]
fn test_environment_parsing() {
    assert_eq!(
        Environment::from_str_or_default("production"),
        Environment::Production
    );
    assert_eq!(Environment::from_str_or_default("PROD"), Environment::Production);
    assert_eq!(Environment::from_str_or_default("test"), Environment::Testing);
    assert_eq!(
        Environment::from_str_or_default("staging"),
        Environment::Development
    );
    assert_eq!(Environment::from_str_or_default(""), Environment::Development);
    assert_eq!(Environment::Testing.to_string(), "testing");
}

#[test]
#[serial]
fn test_defaults_when_only_required_vars_set() {
    clear_env();
    set_required();

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.environment, Environment::Development);
    assert!(config.cors_origins.is_empty());
    assert!(config.llm.api_key.is_none());
    assert_eq!(config.llm.max_tool_rounds, llm::MAX_TOOL_ROUNDS);
    assert_eq!(config.llm.base_url, llm::DEFAULT_BASE_URL);
    assert!(config.cache.redis_url.is_none());
    assert_eq!(config.rate_limit.short_limit, rate_limits::SHORT_WINDOW_LIMIT);
    assert_eq!(config.session.ttl_secs, 1_800);
    assert_eq!(config.session.max_messages, 40);
    assert!(config.response_cache.enabled);
    assert!(config.collaborators.crm_service_key.is_none());

    clear_env();
}

#[test]
#[serial]
fn test_missing_collaborator_endpoint_fails() {
    clear_env();
    env::set_var("CRM_API_URL", "http://crm.internal");

    let err = ServerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("AUTH_API_URL"));

    env::remove_var("CRM_API_URL");
    env::set_var("AUTH_API_URL", "http://auth.internal");
    let err = ServerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("CRM_API_URL"));

    clear_env();
}

#[test]
#[serial]
fn test_overrides_are_applied() {
    clear_env();
    set_required();
    env::set_var("ENVIRONMENT", "production");
    env::set_var("HTTP_PORT", "9100");
    env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example");
    env::set_var("LLM_MODEL_REASONING", "deep-model");
    env::set_var("RATE_LIMIT_SHORT_LIMIT", "5");
    env::set_var("SESSION_TTL_SECS", "60");
    env::set_var("RESPONSE_CACHE_ENABLED", "false");
    env::set_var("REDIS_URL", "redis://127.0.0.1:6379");

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.http_port, 9100);
    assert_eq!(
        config.cors_origins,
        vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
    );
    assert_eq!(config.llm.model_for(ModelTier::Reasoning), "deep-model");
    assert_eq!(config.rate_limit.short_limit, 5);
    assert_eq!(config.session.ttl_secs, 60);
    assert!(!config.response_cache.enabled);
    assert_eq!(config.cache.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));

    clear_env();
}

#[test]
#[serial]
fn test_malformed_numbers_fall_back_to_defaults() {
    clear_env();
    set_required();
    env::set_var("HTTP_PORT", "not-a-port");
    env::set_var("LLM_MAX_TOOL_ROUNDS", "-3");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.http_port, 8081);
    assert_eq!(config.llm.max_tool_rounds, llm::MAX_TOOL_ROUNDS);

    clear_env();
}

#[test]
#[serial]
fn test_api_key_fallbacks() {
    clear_env();
    env::set_var("OPENAI_API_KEY", "sk-fallback");

    let llm_config = LlmConfig::from_env();
    assert_eq!(llm_config.api_key.as_deref(), Some("sk-fallback"));

    let speech = SpeechConfig::from_env(&llm_config);
    assert_eq!(speech.api_key.as_deref(), Some("sk-fallback"));
    assert_eq!(speech.base_url, llm_config.base_url);

    env::set_var("LLM_API_KEY", "sk-primary");
    env::set_var("SPEECH_API_KEY", "sk-speech");
    env::set_var("LLM_MODEL_FAST", "   ");
    let llm_config = LlmConfig::from_env();
    assert_eq!(llm_config.api_key.as_deref(), Some("sk-primary"));
    assert_eq!(llm_config.fast_model, llm::DEFAULT_FAST_MODEL);
    let speech = SpeechConfig::from_env(&llm_config);
    assert_eq!(speech.api_key.as_deref(), Some("sk-speech"));

    clear_env();
}

#[test]
#[serial]
fn test_summary_never_contains_secrets() {
    clear_env();
    set_required();
    env::set_var("LLM_API_KEY", "sk-very-secret");
    env::set_var("CRM_SERVICE_KEY", "service-secret");

    let config = ServerConfig::from_env().unwrap();
    let summary = config.summary();

    assert!(summary.contains("llm_key=set"));
    assert!(summary.contains("store=memory"));
    assert!(summary.contains("rate_limit=30/60s"));
    assert!(!summary.contains("sk-very-secret"));
    assert!(!summary.contains("service-secret"));

    clear_env();
}
