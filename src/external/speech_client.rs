// ABOUTME: Text-to-speech and speech-to-text client for an OpenAI-compatible audio API
// ABOUTME: Retries transient upstream failures before any response body is consumed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::config::SpeechConfig;
use crate::constants::service_names::SPEECH_API;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::llm::sse_parser::{is_retryable_request_error, is_retryable_status, RetryConfig};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const SPEECH_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Audio API client
pub struct SpeechClient {
    http: Client,
    config: SpeechConfig,
    retry: RetryConfig,
}

impl SpeechClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: SpeechConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(SPEECH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> AppResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::config_missing("Speech API key is not configured"))
    }

    /// Synthesize speech, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the upstream call fails
    pub async fn synthesize(&self, text: &str) -> AppResult<Bytes> {
        let key = self.api_key()?;
        let body = SpeechRequest {
            model: &self.config.tts_model,
            voice: &self.config.tts_voice,
            input: text,
            response_format: "mp3",
        };
        let url = self.url("audio/speech");
        let response = self
            .send_with_retry(|| Ok(self.http.post(&url).bearer_auth(key).json(&body)))
            .await?;
        response
            .bytes()
            .await
            .map_err(|e| AppError::external_service(SPEECH_API, format!("Failed to read audio: {e}")))
    }

    /// Transcribe an audio clip to text
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured, the MIME type is
    /// unusable, or the upstream call fails
    pub async fn transcribe(&self, audio: Bytes, mime_type: &str) -> AppResult<String> {
        let key = self.api_key()?;
        let file_name = format!("audio.{}", extension_for(mime_type));
        let url = self.url("audio/transcriptions");
        let response = self
            .send_with_retry(|| {
                // Multipart bodies are consumed on send, so each attempt rebuilds the form
                let part = Part::bytes(audio.to_vec())
                    .file_name(file_name.clone())
                    .mime_str(mime_type)
                    .map_err(|e| AppError::invalid_input(format!("Unsupported audio type: {e}")))?;
                let form = Form::new()
                    .text("model", self.config.stt_model.clone())
                    .part("file", part);
                Ok(self.http.post(&url).bearer_auth(key).multipart(form))
            })
            .await?;

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| {
            AppError::external_service(SPEECH_API, format!("Invalid transcription response: {e}"))
        })?;
        debug!(chars = parsed.text.len(), "Transcription received");
        Ok(parsed.text.trim().to_owned())
    }

    async fn send_with_retry<F>(&self, build: F) -> AppResult<Response>
    where
        F: Fn() -> AppResult<RequestBuilder> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            match build()?.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if is_retryable_status(response.status().as_u16())
                        && attempt < self.retry.max_retries =>
                {
                    warn!(status = %response.status(), attempt, "Transient speech API status, retrying");
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let detail: String = text.chars().take(200).collect();
                    return Err(match status.as_u16() {
                        401 | 403 => AppError::new(
                            ErrorCode::ExternalAuthFailed,
                            "Speech API rejected the credential",
                        ),
                        429 => AppError::new(
                            ErrorCode::ExternalRateLimited,
                            "Speech service is busy. Please try again in a moment.",
                        ),
                        _ => AppError::external_service(SPEECH_API, format!("HTTP {status}: {detail}")),
                    });
                }
                Err(e) if is_retryable_request_error(&e) && attempt < self.retry.max_retries => {
                    warn!(attempt, "Speech API request failed, retrying: {e}");
                }
                Err(e) => {
                    return Err(AppError::external_service(
                        SPEECH_API,
                        format!("Request failed: {e}"),
                    ));
                }
            }
            sleep(self.retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }
}

/// File extension the transcription endpoint uses to sniff the container
fn extension_for(mime_type: &str) -> &'static str {
    let base = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match base {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        _ => "webm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_ignores_codec_suffix() {
        assert_eq!(extension_for("audio/webm;codecs=opus"), "webm");
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("audio/x-wav"), "wav");
    }
}
