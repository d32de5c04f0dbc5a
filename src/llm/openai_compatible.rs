// ABOUTME: OpenAI-compatible chat completions provider with function calling and SSE streaming
// ABOUTME: Retries transient failures of the initial request with exponential backoff
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `OpenAI`-Compatible Provider
//!
//! Works against any endpoint implementing `/chat/completions`, including
//! `OpenAI` itself, Azure-style gateways and local servers such as vLLM.
//! Tool rounds use non-streaming completions with `tool_choice: "auto"`; the
//! final answer uses `stream: true` and the shared SSE parser.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::sse_parser::{
    create_sse_stream, is_retryable_request_error, is_retryable_status, RetryConfig,
};
use super::{
    ChatMessage, ChatRequest, ChatResponseWithTools, ChatStream, LlmProvider, StreamChunk,
    TokenUsage, ToolCall, ToolDefinition,
};
use crate::config::LlmConfig;
use crate::constants::llm::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use crate::constants::service_names::LLM_PROVIDER;
use crate::errors::{AppError, ErrorCode};

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAiFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        let tool_calls = (!msg.tool_calls.is_empty())
            .then(|| msg.tool_calls.iter().map(OpenAiToolCall::from).collect());
        // Assistant turns that only request tools carry null content
        let content = if tool_calls.is_some() && msg.content.is_empty() {
            None
        } else {
            Some(msg.content.clone())
        };
        Self {
            role: msg.role.as_str(),
            content,
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl From<&ToolCall> for OpenAiToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call_type: function_type(),
            function: OpenAiFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

impl From<OpenAiToolCall> for ToolCall {
    fn from(call: OpenAiToolCall) -> Self {
        Self {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(u: OpenAiUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for the `OpenAI`-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer credential
    pub api_key: String,
    /// Model used when a request names none
    pub default_model: String,
    /// Retry policy for the initial request
    pub retry: RetryConfig,
}

impl OpenAiCompatibleConfig {
    /// Build provider settings from the server's model configuration
    ///
    /// Returns `None` when no credential is configured; chat requests then
    /// fail with a configuration error instead of calling upstream.
    #[must_use]
    pub fn from_llm_config(config: &LlmConfig) -> Option<Self> {
        config.api_key.as_ref().map(|api_key| Self {
            base_url: config.base_url.clone(),
            api_key: api_key.clone(),
            default_model: config.fast_model.clone(),
            retry: RetryConfig::default(),
        })
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Generic `OpenAI`-compatible LLM provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Initializing OpenAI-compatible provider: base_url={}, default_model={}",
            config.base_url, config.default_model
        );

        Ok(Self { client, config })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.config.api_key)
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model)
    }

    fn build_request<'a>(
        &'a self,
        request: &'a ChatRequest,
        tools: &'a [ToolDefinition],
        stream: bool,
    ) -> OpenAiRequest<'a> {
        let tools: Vec<OpenAiTool<'a>> = tools
            .iter()
            .map(|t| OpenAiTool {
                tool_type: "function",
                function: OpenAiFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");

        OpenAiRequest {
            model: self.model_for(request),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            tools,
            tool_choice,
        }
    }

    /// Post a chat completion, retrying transient failures before any byte is read
    async fn post_with_retry(&self, body: &OpenAiRequest<'_>) -> Result<Response, AppError> {
        let retry = self.config.retry;
        let mut attempt = 0;

        loop {
            let sent = self
                .authorized(self.client.post(self.api_url("chat/completions")))
                .json(body)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if is_retryable_status(response.status().as_u16())
                        && attempt < retry.max_retries =>
                {
                    warn!(
                        status = %response.status(),
                        attempt,
                        "Transient model provider status, retrying"
                    );
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(Self::parse_error_response(status, &text));
                }
                Err(e) if is_retryable_request_error(&e) && attempt < retry.max_retries => {
                    warn!(attempt, "Model provider request failed, retrying: {e}");
                }
                Err(e) => {
                    error!("Failed to send request to model provider: {e}");
                    return Err(AppError::external_service(
                        LLM_PROVIDER,
                        format!("Failed to connect: {e}"),
                    ));
                }
            }

            sleep(retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    /// Map an upstream error body onto the application error taxonomy
    fn parse_error_response(status: StatusCode, body: &str) -> AppError {
        let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) else {
            return AppError::external_service(
                LLM_PROVIDER,
                format!(
                    "API error ({status}): {}",
                    body.chars().take(200).collect::<String>()
                ),
            );
        };

        let message = parsed.error.message;
        match status.as_u16() {
            401 | 403 => AppError::new(
                ErrorCode::ExternalAuthFailed,
                format!("Model provider rejected the credential: {message}"),
            ),
            429 => AppError::new(
                ErrorCode::ExternalRateLimited,
                "The language model is busy right now. Please try again in a moment.",
            ),
            503 => AppError::new(
                ErrorCode::ExternalServiceUnavailable,
                format!("Model provider unavailable: {message}"),
            ),
            _ => AppError::external_service(
                LLM_PROVIDER,
                format!(
                    "{} - {message}",
                    parsed.error.error_type.as_deref().unwrap_or("unknown")
                ),
            ),
        }
    }

    fn parse_stream_payload(json: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<OpenAiStreamChunk>(json) {
            Ok(chunk) => chunk.choices.into_iter().next().map(|choice| {
                Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                })
            }),
            Err(e) => {
                warn!("Failed to parse stream chunk: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip_all, fields(model = %self.model_for(request), tools = tools.len()))]
    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: &[ToolDefinition],
    ) -> Result<ChatResponseWithTools, AppError> {
        let body = self.build_request(request, tools, false);
        debug!(messages = body.messages.len(), "Sending tool-round completion");

        let response = self.post_with_retry(&body).await?;
        let text = response.text().await.map_err(|e| {
            AppError::external_service(LLM_PROVIDER, format!("Failed to read response: {e}"))
        })?;

        let parsed: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
            error!(
                "Failed to parse model response: {e} - body: {}",
                text.chars().take(500).collect::<String>()
            );
            AppError::external_service(LLM_PROVIDER, format!("Failed to parse response: {e}"))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(LLM_PROVIDER, "API returned no choices"))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(ToolCall::from)
            .collect();

        debug!(
            content_len = choice.message.content.as_ref().map_or(0, String::len),
            tool_calls = tool_calls.len(),
            finish_reason = ?choice.finish_reason,
            "Received tool-round completion"
        );

        Ok(ChatResponseWithTools {
            content: choice.message.content,
            tool_calls,
            model: parsed.model,
            usage: parsed.usage.map(TokenUsage::from),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip_all, fields(model = %self.model_for(request)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let body = self.build_request(request, &[], true);
        let response = self.post_with_retry(&body).await?;

        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_payload,
            LLM_PROVIDER,
        ))
    }
}
