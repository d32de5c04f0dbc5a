// ABOUTME: Dispatch table mapping tool names to their handlers
// ABOUTME: Parses model arguments defensively and times every call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{crm, navigation, ui_actions, ParsedArgs, ToolContext, ToolFamily, ToolName, ToolOutcome};
use crate::external::CrmDataSource;
use crate::llm::ToolCall;
use crate::logging::AppLogger;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Routes tool calls to navigation, UI-intent and CRM handlers
#[derive(Clone)]
pub struct ToolDispatcher {
    crm: Arc<dyn CrmDataSource>,
}

impl ToolDispatcher {
    /// Create a dispatcher backed by the given CRM data source
    #[must_use]
    pub fn new(crm: Arc<dyn CrmDataSource>) -> Self {
        Self { crm }
    }

    /// Execute a tool by wire name
    ///
    /// Never fails: an unknown name yields `{"error": "Unknown tool: <name>"}`
    /// and handler problems come back as `{"error": ...}` outcomes.
    pub async fn execute_tool(
        &self,
        name: &str,
        params: &Map<String, Value>,
        context: &ToolContext,
    ) -> ToolOutcome {
        let Some(tool) = ToolName::from_name(name) else {
            warn!(tool = name, "Model requested an unknown tool");
            return ToolOutcome::error(format!("Unknown tool: {name}"));
        };

        match tool.family() {
            ToolFamily::Navigation => navigation::navigate_to(params),
            ToolFamily::UiIntent => ui_actions::run(tool, params),
            ToolFamily::Crm => crm::run(tool, params, context, self.crm.as_ref()).await,
        }
    }

    /// Execute one model-requested call, parsing its raw arguments first
    pub async fn execute_call(&self, call: &ToolCall, context: &ToolContext) -> ToolOutcome {
        let parsed = ParsedArgs::parse(&call.arguments);
        if let ParsedArgs::Malformed { reason, .. } = &parsed {
            warn!(
                tool = %call.name,
                call_id = %call.id,
                "Malformed tool arguments, dispatching with none: {reason}"
            );
        }
        let args = parsed.into_map();

        let started = Instant::now();
        let outcome = self.execute_tool(&call.name, &args, context).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        AppLogger::log_tool_call(&context.user_id, &call.name, !outcome.is_error(), duration_ms);
        outcome
    }
}
