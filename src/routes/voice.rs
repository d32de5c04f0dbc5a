// ABOUTME: Voice API route handlers for chat streaming, speech synthesis and transcription
// ABOUTME: Each request passes the IP limiter, auth, validation and the per-user limiter in that order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Voice Routes
//!
//! - `POST /api/voice/chat` streams `meta`, `delta`, `error` and `done` events
//! - `POST /api/voice/tts` returns `audio/mpeg`
//! - `POST /api/voice/transcribe` takes a raw audio body and returns `{text}`
//! - `DELETE /api/voice/sessions/:session_id` clears a conversation
//!
//! Failures before streaming starts are JSON errors with the usual status
//! codes. Failures after that are `error` events inside the stream.

use crate::agent::ChatTurn;
use crate::errors::{AppError, AppResult};
use crate::external::Principal;
use crate::llm::prompts::is_supported_language;
use crate::logging::AppLogger;
use crate::middleware::RequestContext;
use crate::rate_limiting::rate_limit_headers;
use crate::resources::ServerResources;
use crate::validation::{
    detect_prompt_injection, validate_audio_file, validate_question, validate_tts_text,
};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Chat request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    #[serde(default)]
    question: Value,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    page_path: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TtsBody {
    #[serde(default)]
    text: Value,
}

/// Voice route handlers
pub struct VoiceRoutes;

impl VoiceRoutes {
    /// Create all voice routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/voice/chat", post(Self::chat))
            .route("/api/voice/tts", post(Self::text_to_speech))
            .route("/api/voice/transcribe", post(Self::transcribe))
            .route("/api/voice/sessions/:session_id", delete(Self::clear_session))
            .with_state(resources)
    }

    /// Pre-auth IP limiter then session resolution
    async fn authenticate(
        resources: &ServerResources,
        context: &RequestContext,
    ) -> AppResult<Principal> {
        resources.rate_limiter.enforce(&context.client_ip).await?;
        resources
            .auth
            .get_session_user(&context.credentials)
            .await?
            .ok_or_else(AppError::auth_required)
    }

    fn parse_json<T: for<'de> Deserialize<'de>>(body: &Bytes) -> AppResult<T> {
        serde_json::from_slice(body)
            .map_err(|e| AppError::invalid_input(format!("Invalid JSON body: {e}")))
    }

    async fn chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let context = RequestContext::from_headers(&headers);
        let principal = Self::authenticate(&resources, &context).await?;

        let request: ChatBody = Self::parse_json(&body)?;
        let session_id = request
            .session_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::invalid_input("sessionId is required"))?;
        let question = validate_question(&request.question).into_result()?;
        let language = request.language.filter(|lang| {
            let supported = is_supported_language(lang);
            if !supported {
                debug!(language = %lang, "Ignoring unsupported language hint");
            }
            supported
        });

        let decision = resources
            .rate_limiter
            .enforce(&format!("voice:{}:{}", principal.user_id, context.client_ip))
            .await?;

        let injection = detect_prompt_injection(&question);
        if let Some(pattern) = injection.pattern {
            AppLogger::log_prompt_injection(&principal.user_id, pattern, &session_id);
        }

        let frames = resources
            .agent
            .handle_turn(ChatTurn {
                session_id,
                question,
                page_path: request.page_path.filter(|p| !p.trim().is_empty()),
                language,
                user_id: principal.user_id,
                auth_context: context.credentials.auth_context(),
            })
            .await?;

        let events = ReceiverStream::new(frames).map(|frame| Ok::<_, Infallible>(frame.to_event()));
        Ok((
            rate_limit_headers(&decision),
            Sse::new(events).keep_alive(KeepAlive::default()),
        )
            .into_response())
    }

    async fn text_to_speech(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let context = RequestContext::from_headers(&headers);
        let principal = Self::authenticate(&resources, &context).await?;

        let request: TtsBody = Self::parse_json(&body)?;
        let text = validate_tts_text(&request.text).into_result()?;
        let decision = resources
            .rate_limiter
            .enforce(&format!("tts:{}:{}", principal.user_id, context.client_ip))
            .await?;

        let audio = resources.speech.synthesize(&text).await?;
        let mut response = (rate_limit_headers(&decision), audio).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
        Ok(response)
    }

    async fn transcribe(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let context = RequestContext::from_headers(&headers);
        let principal = Self::authenticate(&resources, &context).await?;

        let mime_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        validate_audio_file(body.len(), &mime_type).into_result()?;
        let decision = resources
            .rate_limiter
            .enforce(&format!("stt:{}:{}", principal.user_id, context.client_ip))
            .await?;

        let text = resources.speech.transcribe(body, &mime_type).await?;
        Ok((rate_limit_headers(&decision), Json(json!({ "text": text }))).into_response())
    }

    async fn clear_session(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(session_id): Path<String>,
    ) -> Result<StatusCode, AppError> {
        let context = RequestContext::from_headers(&headers);
        let principal = Self::authenticate(&resources, &context).await?;

        match resources.sessions.peek(&session_id).await? {
            Some(session) if session.user_id != principal.user_id => {
                Err(AppError::not_found("Session"))
            }
            Some(_) => {
                resources.sessions.clear_session(&session_id).await?;
                Ok(StatusCode::NO_CONTENT)
            }
            None => Ok(StatusCode::NO_CONTENT),
        }
    }
}
