// ABOUTME: Environment configuration for the voice agent server and its collaborators
// ABOUTME: Model provider, speech, CRM and auth endpoints plus the nested store configs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use super::{
    env_non_empty, env_or, CacheConfig, RateLimitConfig, ResponseCacheConfig, SessionConfig,
};
use crate::constants::{llm, server, speech};
use crate::llm::ModelTier;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Provider credential; chat requests fail with a 500 when absent
    pub api_key: Option<String>,
    /// Model used for the fast tier
    pub fast_model: String,
    /// Model used for the standard tier
    pub standard_model: String,
    /// Model used for the reasoning tier
    pub reasoning_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token ceiling
    pub max_tokens: u32,
    /// Tool-calling round budget per request
    pub max_tool_rounds: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: llm::DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            fast_model: llm::DEFAULT_FAST_MODEL.to_owned(),
            standard_model: llm::DEFAULT_STANDARD_MODEL.to_owned(),
            reasoning_model: llm::DEFAULT_REASONING_MODEL.to_owned(),
            temperature: llm::DEFAULT_TEMPERATURE,
            max_tokens: llm::DEFAULT_MAX_TOKENS,
            max_tool_rounds: llm::MAX_TOOL_ROUNDS,
        }
    }
}

impl LlmConfig {
    /// Load model provider configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: env_non_empty("LLM_BASE_URL")
                .unwrap_or_else(|| llm::DEFAULT_BASE_URL.to_owned()),
            api_key: env_non_empty("LLM_API_KEY").or_else(|| env_non_empty("OPENAI_API_KEY")),
            fast_model: env_non_empty("LLM_MODEL_FAST")
                .unwrap_or_else(|| llm::DEFAULT_FAST_MODEL.to_owned()),
            standard_model: env_non_empty("LLM_MODEL_STANDARD")
                .unwrap_or_else(|| llm::DEFAULT_STANDARD_MODEL.to_owned()),
            reasoning_model: env_non_empty("LLM_MODEL_REASONING")
                .unwrap_or_else(|| llm::DEFAULT_REASONING_MODEL.to_owned()),
            temperature: env_or("LLM_TEMPERATURE", llm::DEFAULT_TEMPERATURE),
            max_tokens: env_or("LLM_MAX_TOKENS", llm::DEFAULT_MAX_TOKENS),
            max_tool_rounds: env_or("LLM_MAX_TOOL_ROUNDS", llm::MAX_TOOL_ROUNDS),
        }
    }

    /// Concrete model name for a routing tier
    #[must_use]
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Standard => &self.standard_model,
            ModelTier::Reasoning => &self.reasoning_model,
        }
    }
}

/// Text-to-speech and speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// OpenAI-compatible base URL for the audio endpoints
    pub base_url: String,
    /// Credential for the audio endpoints
    pub api_key: Option<String>,
    /// Synthesis model
    pub tts_model: String,
    /// Synthesis voice
    pub tts_voice: String,
    /// Transcription model
    pub stt_model: String,
}

impl SpeechConfig {
    /// Load speech configuration, defaulting endpoint and key to the LLM settings
    #[must_use]
    pub fn from_env(llm_config: &LlmConfig) -> Self {
        Self {
            base_url: env_non_empty("SPEECH_BASE_URL").unwrap_or_else(|| llm_config.base_url.clone()),
            api_key: env_non_empty("SPEECH_API_KEY").or_else(|| llm_config.api_key.clone()),
            tts_model: env_non_empty("TTS_MODEL")
                .unwrap_or_else(|| speech::DEFAULT_TTS_MODEL.to_owned()),
            tts_voice: env_non_empty("TTS_VOICE")
                .unwrap_or_else(|| speech::DEFAULT_TTS_VOICE.to_owned()),
            stt_model: env_non_empty("STT_MODEL")
                .unwrap_or_else(|| speech::DEFAULT_STT_MODEL.to_owned()),
        }
    }
}

/// Endpoints of the external CRM data and authentication services
#[derive(Debug, Clone)]
pub struct CollaboratorConfig {
    /// Base URL of the CRM REST data service
    pub crm_api_url: String,
    /// Optional service key sent alongside the caller's auth context
    pub crm_service_key: Option<String>,
    /// Base URL of the session/auth service
    pub auth_api_url: String,
}

impl CollaboratorConfig {
    /// Load collaborator endpoints from environment
    ///
    /// # Errors
    ///
    /// Returns an error if `CRM_API_URL` or `AUTH_API_URL` is missing
    pub fn from_env() -> Result<Self> {
        let Some(crm_api_url) = env_non_empty("CRM_API_URL") else {
            bail!("CRM_API_URL must be set to the CRM data service base URL");
        };
        let Some(auth_api_url) = env_non_empty("AUTH_API_URL") else {
            bail!("AUTH_API_URL must be set to the session service base URL");
        };
        Ok(Self {
            crm_api_url,
            crm_service_key: env_non_empty("CRM_SERVICE_KEY"),
            auth_api_url,
        })
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// Model provider settings
    pub llm: LlmConfig,
    /// Speech collaborator settings
    pub speech: SpeechConfig,
    /// CRM and auth collaborator endpoints
    pub collaborators: CollaboratorConfig,
    /// Session and response cache backing store
    pub cache: CacheConfig,
    /// Two-window rate limits
    pub rate_limit: RateLimitConfig,
    /// Session lifetime and trimming
    pub session: SessionConfig,
    /// Fast-path answer cache
    pub response_cache: ResponseCacheConfig,
}

impl ServerConfig {
    /// Load the full configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required collaborator endpoint is missing
    pub fn from_env() -> Result<Self> {
        let llm = LlmConfig::from_env();
        let speech = SpeechConfig::from_env(&llm);
        let cors_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            http_port: env_or("HTTP_PORT", server::DEFAULT_HTTP_PORT),
            environment: Environment::from_str_or_default(
                &env::var("ENVIRONMENT").unwrap_or_default(),
            ),
            cors_origins,
            llm,
            speech,
            collaborators: CollaboratorConfig::from_env()?,
            cache: CacheConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            session: SessionConfig::from_env(),
            response_cache: ResponseCacheConfig::from_env(),
        })
    }

    /// One-line summary for startup logs (never includes secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "environment={} port={} llm={} models=[{}, {}, {}] llm_key={} store={} rate_limit={}/{}s,{}/{}s response_cache={}",
            self.environment,
            self.http_port,
            self.llm.base_url,
            self.llm.fast_model,
            self.llm.standard_model,
            self.llm.reasoning_model,
            if self.llm.api_key.is_some() { "set" } else { "missing" },
            if self.cache.redis_url.is_some() { "redis" } else { "memory" },
            self.rate_limit.short_limit,
            self.rate_limit.short_window_secs,
            self.rate_limit.long_limit,
            self.rate_limit.long_window_secs,
            self.response_cache.enabled,
        )
    }
}
