// ABOUTME: Detached post-stream persistence of the assistant answer, analytics and response cache
// ABOUTME: Each write has its own error boundary; failures are logged and never reach the client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::response_cache::{CachedResponse, ResponseCache};
use crate::external::{AnalyticsSink, TurnRecord};
use crate::llm::ChatMessage;
use crate::session::SessionStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Everything persistence needs about a finished turn
#[derive(Debug, Clone)]
pub struct CompletedTurn {
    /// Conversation id
    pub session_id: String,
    /// Principal
    pub user_id: String,
    /// Credential used to scope analytics writes
    pub auth_context: String,
    /// Sanitized question
    pub question: String,
    /// Page the user was on
    pub page_path: Option<String>,
    /// Streamed answer text
    pub answer: String,
    /// Tier that answered
    pub model: String,
    /// Tool calls dispatched
    pub tool_calls: usize,
    /// Milliseconds from request to `done`
    pub duration_ms: u64,
    /// Whether the stream ended without an error frame
    pub success: bool,
    /// Whether the answer itself came from the response cache
    pub from_cache: bool,
}

impl CompletedTurn {
    /// Only clean, tool-free, freshly generated answers are worth caching
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.success && self.tool_calls == 0 && !self.from_cache && !self.answer.trim().is_empty()
    }
}

/// Handles to the stores written after a turn
#[derive(Clone)]
pub struct TurnPersistence {
    sessions: SessionStore,
    analytics: Arc<dyn AnalyticsSink>,
    response_cache: ResponseCache,
}

impl TurnPersistence {
    /// Bundle the stores
    #[must_use]
    pub fn new(
        sessions: SessionStore,
        analytics: Arc<dyn AnalyticsSink>,
        response_cache: ResponseCache,
    ) -> Self {
        Self {
            sessions,
            analytics,
            response_cache,
        }
    }

    /// Persist in a background task the response path never awaits
    pub fn spawn(&self, turn: CompletedTurn) -> JoinHandle<()> {
        let persistence = self.clone();
        tokio::spawn(async move { persistence.persist(turn).await })
    }

    /// Run every write, logging failures
    pub async fn persist(&self, turn: CompletedTurn) {
        if !turn.answer.is_empty() {
            if let Err(e) = self
                .sessions
                .add_message(&turn.session_id, ChatMessage::assistant(turn.answer.clone()))
                .await
            {
                warn!(session_id = %turn.session_id, error = %e, "Failed to save assistant message");
            }
        }

        if turn.is_cacheable() {
            let cached = CachedResponse {
                response: turn.answer.clone(),
                model: turn.model.clone(),
                cached_at: Utc::now(),
            };
            if let Err(e) = self
                .response_cache
                .store(&turn.user_id, &turn.question, turn.page_path.as_deref(), &cached)
                .await
            {
                warn!(session_id = %turn.session_id, error = %e, "Failed to cache response");
            }
        }

        let record = TurnRecord {
            session_id: turn.session_id.clone(),
            user_id: turn.user_id.clone(),
            auth_context: turn.auth_context.clone(),
            question: turn.question.clone(),
            response: turn.answer.clone(),
            model: turn.model.clone(),
            tool_calls: turn.tool_calls,
            duration_ms: turn.duration_ms,
            success: turn.success,
            page_path: turn.page_path.clone(),
            completed_at: Utc::now(),
        };
        if let Err(e) = self.analytics.record_turn(&record).await {
            warn!(session_id = %turn.session_id, error = %e, "Failed to record turn analytics");
        }

        debug!(session_id = %turn.session_id, "Turn persisted");
    }
}
