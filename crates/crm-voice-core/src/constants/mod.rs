// ABOUTME: Application constants organized by domain for the voice agent
// ABOUTME: Input limits, rate-limit windows, session and cache TTLs, Redis and LLM defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Cache capacity, cleanup and key namespace constants
pub mod cache;

/// Input size ceilings and accepted media types
pub mod limits;

/// Two-window rate limit defaults
pub mod rate_limits;

/// Service identifiers used in logs and health output
pub mod service_names {
    /// Voice agent server service name
    pub const CRM_VOICE_AGENT: &str = "crm-voice-agent";
    /// Label used in upstream error messages for the model provider
    pub const LLM_PROVIDER: &str = "LLM";
    /// Label used in upstream error messages for the CRM data service
    pub const CRM_API: &str = "CRM";
    /// Label used in upstream error messages for the auth service
    pub const AUTH_API: &str = "Auth";
    /// Label used in upstream error messages for speech services
    pub const SPEECH_API: &str = "Speech";
}

/// Conversation session defaults
pub mod session {
    /// Absolute session lifetime measured from creation (30 minutes)
    pub const SESSION_TTL_SECS: u64 = 1_800;
    /// Maximum retained non-system messages per session
    pub const MAX_CONVERSATION_MESSAGES: usize = 40;
    /// Owner used for unauthenticated landing-page sessions
    pub const PUBLIC_USER_ID: &str = "public";
}

/// Language model defaults
pub mod llm {
    /// Default OpenAI-compatible endpoint
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
    /// Default model for the fast tier
    pub const DEFAULT_FAST_MODEL: &str = "gpt-4.1-nano";
    /// Default model for the standard tier
    pub const DEFAULT_STANDARD_MODEL: &str = "gpt-4.1-mini";
    /// Default model for the reasoning tier
    pub const DEFAULT_REASONING_MODEL: &str = "gpt-4.1";
    /// Maximum tool-calling rounds per request
    pub const MAX_TOOL_ROUNDS: usize = 5;
    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.4;
    /// Default completion token ceiling for spoken answers
    pub const DEFAULT_MAX_TOKENS: u32 = 600;
    /// Connect timeout for model provider calls
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Overall request timeout for model provider calls
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
}

/// Speech collaborator defaults
pub mod speech {
    /// Default text-to-speech model
    pub const DEFAULT_TTS_MODEL: &str = "tts-1";
    /// Default synthesized voice
    pub const DEFAULT_TTS_VOICE: &str = "alloy";
    /// Default speech-to-text model
    pub const DEFAULT_STT_MODEL: &str = "whisper-1";
}

/// Redis connection defaults
pub mod redis {
    /// Connection timeout in seconds
    pub const CONNECTION_TIMEOUT_SECS: u64 = 5;
    /// Response timeout in seconds
    pub const RESPONSE_TIMEOUT_SECS: u64 = 3;
    /// Reconnection retries after a dropped connection
    pub const RECONNECTION_RETRIES: usize = 3;
    /// Exponential backoff base
    pub const RETRY_EXPONENT_BASE: u64 = 2;
    /// Maximum retry delay in milliseconds
    pub const MAX_RETRY_DELAY_MS: u64 = 5_000;
    /// Retries for the initial connection at startup
    pub const INITIAL_CONNECTION_RETRIES: u32 = 2;
    /// First retry delay in milliseconds
    pub const INITIAL_RETRY_DELAY_MS: u64 = 500;
    /// Key prefix for rate limit counters
    pub const RATE_LIMIT_KEY_PREFIX: &str = "crm-voice:ratelimit:";
}

/// HTTP server defaults
pub mod server {
    /// Default HTTP listen port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}
