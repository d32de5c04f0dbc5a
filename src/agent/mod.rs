// ABOUTME: Voice agent turn orchestration from validated question to streamed answer
// ABOUTME: Routes the tier, loads the session, runs the tool loop and streams the final call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Voice Agent
//!
//! [`VoiceAgent::handle_turn`] does the fallible setup on the request path
//! (provider check, session load, user message append) and then hands the
//! rest to a producer task:
//!
//! 1. response cache fast path, when enabled
//! 2. tool loop ([`tool_loop::ToolLoop`])
//! 3. `meta` frame, streamed `delta` frames, `done`
//! 4. detached persistence ([`persistence::TurnPersistence`])
//!
//! Failures inside the producer are reported in-band as `error` frames.

/// Post-stream persistence
pub mod persistence;
/// Answer cache for tool-free turns
pub mod response_cache;
/// Stream frames and the producer half
pub mod stream;
/// Bounded tool-calling loop
pub mod tool_loop;

pub use persistence::{CompletedTurn, TurnPersistence};
pub use response_cache::{CachedResponse, ResponseCache};
pub use stream::{StreamFrame, FRAME_BUFFER};
pub use tool_loop::{LoopExit, ToolLoop, ToolLoopOutcome};

use crate::config::LlmConfig;
use crate::errors::{AppError, AppResult};
use crate::external::AnalyticsSink;
use crate::llm::{
    build_system_prompt, select_model, ChatMessage, ChatRequest, LlmProvider, MessageRole, ModelTier,
};
use crate::logging::AppLogger;
use crate::session::SessionStore;
use crate::tools::{ToolContext, ToolDispatcher};
use std::sync::Arc;
use std::time::Instant;
use stream::{stream_answer, FrameSender};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One validated chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Client-supplied conversation id
    pub session_id: String,
    /// Sanitized question
    pub question: String,
    /// Page the user is on
    pub page_path: Option<String>,
    /// Requested reply language
    pub language: Option<String>,
    /// Authenticated principal
    pub user_id: String,
    /// Credential forwarded to the CRM data service
    pub auth_context: String,
}

/// Orchestrates chat turns
#[derive(Clone)]
pub struct VoiceAgent {
    provider: Option<Arc<dyn LlmProvider>>,
    llm_config: LlmConfig,
    sessions: SessionStore,
    dispatcher: ToolDispatcher,
    response_cache: ResponseCache,
    persistence: TurnPersistence,
}

impl VoiceAgent {
    /// Assemble an agent; `provider` is `None` when no model credential is configured
    #[must_use]
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        llm_config: LlmConfig,
        sessions: SessionStore,
        dispatcher: ToolDispatcher,
        analytics: Arc<dyn AnalyticsSink>,
        response_cache: ResponseCache,
    ) -> Self {
        let persistence = TurnPersistence::new(sessions.clone(), analytics, response_cache.clone());
        Self {
            provider,
            llm_config,
            sessions,
            dispatcher,
            response_cache,
            persistence,
        }
    }

    /// Session store shared with the routes
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Configured model provider
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` when no credential is configured
    pub fn provider(&self) -> AppResult<Arc<dyn LlmProvider>> {
        self.provider
            .clone()
            .ok_or_else(|| AppError::config_missing("Language model API key is not configured"))
    }

    /// Start a turn and return the receiving end of its frame stream
    ///
    /// # Errors
    ///
    /// Returns an error before any frame is produced when no model credential
    /// is configured or the session store fails.
    pub async fn handle_turn(&self, turn: ChatTurn) -> AppResult<mpsc::Receiver<StreamFrame>> {
        let started = Instant::now();
        let provider = self.provider()?;
        let tier = select_model(&turn.question);

        let session = self
            .sessions
            .get_session(&turn.session_id, &turn.user_id)
            .await?;
        if turn.language.is_some() && turn.language != session.language {
            self.sessions
                .set_language(&turn.session_id, turn.language.clone())
                .await?;
        }
        self.sessions
            .add_message(&turn.session_id, ChatMessage::user(turn.question.clone()))
            .await?;

        let language = turn.language.clone().or(session.language);
        let mut messages = Vec::with_capacity(session.conversation.len() + 2);
        messages.push(ChatMessage::system(build_system_prompt(
            turn.page_path.as_deref(),
            language.as_deref(),
        )));
        messages.extend(session.conversation.into_iter().filter(|m| !m.is_system()));
        messages.push(ChatMessage::user(turn.question.clone()));

        debug!(
            session_id = %turn.session_id,
            tier = %tier,
            history = messages.len(),
            "Starting voice turn"
        );

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let agent = self.clone();
        tokio::spawn(async move {
            agent
                .produce(provider, turn, tier, messages, started, FrameSender::new(tx))
                .await;
        });
        Ok(rx)
    }

    /// Producer task body: everything after the request-path setup
    async fn produce(
        &self,
        provider: Arc<dyn LlmProvider>,
        turn: ChatTurn,
        tier: ModelTier,
        messages: Vec<ChatMessage>,
        started: Instant,
        mut frames: FrameSender,
    ) {
        if let Some(hit) = self
            .response_cache
            .lookup(&turn.user_id, &turn.question, turn.page_path.as_deref())
            .await
        {
            self.replay_cached(turn, hit, started, frames).await;
            return;
        }

        let template = ChatRequest::new(Vec::new())
            .with_model(self.llm_config.model_for(tier))
            .with_temperature(self.llm_config.temperature)
            .with_max_tokens(self.llm_config.max_tokens);
        let context = ToolContext {
            user_id: turn.user_id.clone(),
            auth_context: turn.auth_context.clone(),
        };

        let outcome = ToolLoop::new(
            provider.as_ref(),
            &self.dispatcher,
            &template,
            self.llm_config.max_tool_rounds,
        )
        .run(messages, &context)
        .await;

        frames
            .send(StreamFrame::Meta {
                client_actions: outcome.client_actions.clone(),
                model: tier.as_str().to_owned(),
            })
            .await;

        let (answer, errored) = if let Some(failure) = &outcome.failure {
            frames
                .send(StreamFrame::Error {
                    error: failure.message.clone(),
                })
                .await;
            (String::new(), true)
        } else if !frames.is_connected() {
            // Client is gone; record the resolved reply without streaming
            debug!(session_id = %turn.session_id, "Client left before streaming, skipping answer stream");
            (resolved_reply(&outcome.messages), false)
        } else {
            let request = ChatRequest {
                messages: outcome.messages.clone(),
                ..template.clone()
            }
            .with_streaming();
            let streamed = stream_answer(provider.as_ref(), &request, &mut frames).await;
            (streamed.text, streamed.errored)
        };

        let duration_ms = elapsed_ms(started);
        frames
            .send(StreamFrame::Done {
                success: !errored,
                duration: duration_ms,
            })
            .await;
        drop(frames);

        AppLogger::log_turn_completed(
            &turn.session_id,
            tier.as_str(),
            outcome.rounds,
            duration_ms,
            !errored,
        );

        self.persistence.spawn(CompletedTurn {
            session_id: turn.session_id,
            user_id: turn.user_id,
            auth_context: turn.auth_context,
            question: turn.question,
            page_path: turn.page_path,
            answer,
            model: tier.as_str().to_owned(),
            tool_calls: outcome.tool_calls,
            duration_ms,
            success: !errored,
            from_cache: false,
        });
    }

    async fn replay_cached(
        &self,
        turn: ChatTurn,
        hit: CachedResponse,
        started: Instant,
        mut frames: FrameSender,
    ) {
        info!(session_id = %turn.session_id, "Answering from response cache");
        frames
            .send(StreamFrame::Meta {
                client_actions: Vec::new(),
                model: hit.model.clone(),
            })
            .await;
        frames
            .send(StreamFrame::Delta {
                text: hit.response.clone(),
            })
            .await;
        let duration_ms = elapsed_ms(started);
        frames
            .send(StreamFrame::Done {
                success: true,
                duration: duration_ms,
            })
            .await;
        drop(frames);

        self.persistence.spawn(CompletedTurn {
            session_id: turn.session_id,
            user_id: turn.user_id,
            auth_context: turn.auth_context,
            question: turn.question,
            page_path: turn.page_path,
            answer: hit.response,
            model: hit.model,
            tool_calls: 0,
            duration_ms,
            success: true,
            from_cache: true,
        });
    }
}

/// Text of the model's final tool-free reply, empty when the loop ran out of rounds
fn resolved_reply(messages: &[ChatMessage]) -> String {
    messages
        .last()
        .filter(|m| m.role == MessageRole::Assistant && m.tool_calls.is_empty())
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
