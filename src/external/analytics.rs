// ABOUTME: Per-turn analytics sink and its CRM-backed voice_sessions upsert
// ABOUTME: Called only from the detached persistence task, never on the response path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::crm_client::{CrmDataSource, CrmQuery};
use crate::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Table holding one row per voice session
pub const VOICE_SESSIONS_TABLE: &str = "voice_sessions";

/// Summary of one completed chat turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRecord {
    /// Conversation the turn belongs to
    pub session_id: String,
    /// Principal that asked
    pub user_id: String,
    /// Credential used to scope the write
    pub auth_context: String,
    /// Sanitized question
    pub question: String,
    /// Full streamed answer
    pub response: String,
    /// Tier that answered
    pub model: String,
    /// Tool calls dispatched during the turn
    pub tool_calls: usize,
    /// Wall time from request to `done`
    pub duration_ms: u64,
    /// Whether the stream finished without an error frame
    pub success: bool,
    /// Page the user was on
    pub page_path: Option<String>,
    /// When the turn finished
    pub completed_at: DateTime<Utc>,
}

/// Destination for turn analytics
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Record one turn
    async fn record_turn(&self, turn: &TurnRecord) -> AppResult<()>;
}

/// Upserts a `voice_sessions` row through the CRM data service
pub struct CrmAnalyticsSink {
    crm: Arc<dyn CrmDataSource>,
}

impl CrmAnalyticsSink {
    /// Create a sink writing through the given CRM client
    #[must_use]
    pub fn new(crm: Arc<dyn CrmDataSource>) -> Self {
        Self { crm }
    }

    fn turn_fields(turn: &TurnRecord) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("last_question".to_owned(), json!(turn.question));
        fields.insert("last_response".to_owned(), json!(turn.response));
        fields.insert("last_model".to_owned(), json!(turn.model));
        fields.insert("last_page_path".to_owned(), json!(turn.page_path));
        fields.insert("last_success".to_owned(), json!(turn.success));
        fields.insert("last_duration_ms".to_owned(), json!(turn.duration_ms));
        fields.insert("updated_at".to_owned(), json!(turn.completed_at.to_rfc3339()));
        fields
    }
}

#[async_trait]
impl AnalyticsSink for CrmAnalyticsSink {
    async fn record_turn(&self, turn: &TurnRecord) -> AppResult<()> {
        let query = CrmQuery::with_limit(1).filter("session_id", turn.session_id.clone());
        let existing = self
            .crm
            .read(VOICE_SESSIONS_TABLE, &query, &turn.auth_context)
            .await?;

        let mut fields = Self::turn_fields(turn);

        if let Some(row) = existing.first() {
            let id = match row.get("id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            if let Some(id) = id {
                let turns = row.get("turn_count").and_then(Value::as_u64).unwrap_or(0);
                let tools = row.get("tool_call_count").and_then(Value::as_u64).unwrap_or(0);
                fields.insert("turn_count".to_owned(), json!(turns + 1));
                fields.insert(
                    "tool_call_count".to_owned(),
                    json!(tools + turn.tool_calls as u64),
                );
                self.crm
                    .update(VOICE_SESSIONS_TABLE, &id, fields, &turn.auth_context)
                    .await?;
                return Ok(());
            }
        }

        fields.insert("session_id".to_owned(), json!(turn.session_id));
        fields.insert("user_id".to_owned(), json!(turn.user_id));
        fields.insert("turn_count".to_owned(), json!(1));
        fields.insert("tool_call_count".to_owned(), json!(turn.tool_calls));
        fields.insert("started_at".to_owned(), json!(turn.completed_at.to_rfc3339()));
        self.crm
            .create(VOICE_SESSIONS_TABLE, fields, &turn.auth_context)
            .await?;
        Ok(())
    }
}
