// ABOUTME: Bounded tool-calling loop between the model and the dispatch table
// ABOUTME: Each round runs all requested calls concurrently and appends results before the next call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::AppError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::tools::{tool_definitions, ClientAction, ToolContext, ToolDispatcher};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

/// How the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The model answered without requesting tools
    Resolved,
    /// Every round requested tools; the answer uses the context gathered so far
    RoundsExhausted,
}

/// Result of the tool loop
#[derive(Debug)]
pub struct ToolLoopOutcome {
    /// Conversation including assistant tool requests, tool results and,
    /// when resolved, the model's final assistant message
    pub messages: Vec<ChatMessage>,
    /// Client actions in the order tools emitted them
    pub client_actions: Vec<ClientAction>,
    /// Rounds that dispatched tools
    pub rounds: usize,
    /// Tool calls dispatched across all rounds
    pub tool_calls: usize,
    /// How the loop ended; `None` when a model call failed
    pub exit: Option<LoopExit>,
    /// Model failure that stopped the loop
    pub failure: Option<AppError>,
}

/// Drives model calls against the dispatch table
pub struct ToolLoop<'a> {
    provider: &'a dyn LlmProvider,
    dispatcher: &'a ToolDispatcher,
    template: &'a ChatRequest,
    max_rounds: usize,
}

impl<'a> ToolLoop<'a> {
    /// `template` supplies model, temperature and token settings; its
    /// messages are ignored
    #[must_use]
    pub const fn new(
        provider: &'a dyn LlmProvider,
        dispatcher: &'a ToolDispatcher,
        template: &'a ChatRequest,
        max_rounds: usize,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            template,
            max_rounds,
        }
    }

    fn request(&self, messages: &[ChatMessage]) -> ChatRequest {
        ChatRequest {
            messages: messages.to_vec(),
            ..self.template.clone()
        }
    }

    /// Run rounds until the model stops requesting tools or the budget runs out
    pub async fn run(&self, mut messages: Vec<ChatMessage>, context: &ToolContext) -> ToolLoopOutcome {
        let tools = tool_definitions();
        let mut client_actions = Vec::new();
        let mut rounds = 0;
        let mut tool_calls = 0;

        for round in 0..self.max_rounds {
            let response = match self
                .provider
                .complete_with_tools(&self.request(&messages), tools)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(round, error = %e, "Model call failed during tool loop");
                    return ToolLoopOutcome {
                        messages,
                        client_actions,
                        rounds,
                        tool_calls,
                        exit: None,
                        failure: Some(e),
                    };
                }
            };

            let content = response.content.unwrap_or_default();
            if response.tool_calls.is_empty() {
                debug!(round, "Model answered without tools");
                messages.push(ChatMessage::assistant(content));
                return ToolLoopOutcome {
                    messages,
                    client_actions,
                    rounds,
                    tool_calls,
                    exit: Some(LoopExit::Resolved),
                    failure: None,
                };
            }

            let calls = response.tool_calls;
            info!(
                round,
                calls = calls.len(),
                user_id = %context.user_id,
                "Dispatching tool calls"
            );

            // Sibling calls are independent; results are appended in request order
            let outcomes = join_all(
                calls
                    .iter()
                    .map(|call| self.dispatcher.execute_call(call, context)),
            )
            .await;

            messages.push(ChatMessage::assistant_with_tool_calls(content, calls.clone()));
            for (call, outcome) in calls.iter().zip(outcomes) {
                messages.push(ChatMessage::tool(&call.id, outcome.to_json().to_string()));
                if let Some(action) = outcome.client_action {
                    client_actions.push(action);
                }
            }

            rounds += 1;
            tool_calls += calls.len();
        }

        warn!(
            max_rounds = self.max_rounds,
            tool_calls, "Tool round budget exhausted, answering with gathered context"
        );
        ToolLoopOutcome {
            messages,
            client_actions,
            rounds,
            tool_calls,
            exit: Some(LoopExit::RoundsExhausted),
            failure: None,
        }
    }
}
