// ABOUTME: Shared test utilities and fakes for integration tests
// ABOUTME: Scripted model provider, in-memory CRM, static auth and resource builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `crm_voice_agent`

use async_trait::async_trait;
use crm_voice_agent::cache::Cache;
use crm_voice_agent::config::{
    CacheConfig, CollaboratorConfig, Environment, LlmConfig, RateLimitConfig, ResponseCacheConfig,
    ServerConfig, SessionConfig, SpeechConfig,
};
use crm_voice_agent::errors::{AppError, AppResult};
use crm_voice_agent::external::{
    AnalyticsSink, AuthProvider, CrmDataSource, CrmQuery, Principal, RequestCredentials,
    TurnRecord,
};
use crm_voice_agent::llm::{
    ChatRequest, ChatResponseWithTools, ChatStream, LlmProvider, MessageRole, StreamChunk,
    ToolCall, ToolDefinition,
};
use crm_voice_agent::rate_limiting::RateLimiter;
use crm_voice_agent::resources::{ServerResources, ServerResourcesBuilder};
use crm_voice_agent::session::SessionStore;
use futures_util::stream;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::env;
use std::iter;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::time::sleep;
use tracing::Level;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

// ============================================================================
// Scripted model provider
// ============================================================================

/// One scripted non-streaming reply
pub enum Scripted {
    /// Plain text answer, no tools
    Text(String),
    /// Tool calls as `(id, name, raw arguments)`
    Tools(Vec<(String, String, String)>),
    /// Provider failure
    Fail(String),
}

/// Scripted streaming reply
#[derive(Clone)]
pub enum StreamScript {
    /// Emit these deltas, then a final chunk
    Deltas(Vec<String>),
    /// Emit these deltas, then fail
    FailAfter(Vec<String>, String),
}

/// Model provider that replays scripted responses and records requests
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Scripted>>,
    stream: Mutex<StreamScript>,
    /// Requests seen by `complete_with_tools`
    pub tool_requests: Mutex<Vec<ChatRequest>>,
    /// Requests seen by `complete_stream`
    pub stream_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Scripted>, stream: StreamScript) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            stream: Mutex::new(stream),
            tool_requests: Mutex::new(Vec::new()),
            stream_requests: Mutex::new(Vec::new()),
        })
    }

    /// Provider that answers without tools and streams `deltas`
    pub fn answering(deltas: &[&str]) -> Arc<Self> {
        Self::new(
            vec![Scripted::Text(deltas.concat())],
            StreamScript::Deltas(deltas.iter().map(|d| (*d).to_owned()).collect()),
        )
    }

    pub fn tool_call_count(&self) -> usize {
        self.tool_requests.lock().unwrap().len()
    }

    pub fn stream_call_count(&self) -> usize {
        self.stream_requests.lock().unwrap().len()
    }
}

/// Build a tool-calls reply
pub fn tool_reply(calls: &[(&str, &str, Value)]) -> Scripted {
    Scripted::Tools(
        calls
            .iter()
            .map(|(id, name, args)| ((*id).to_owned(), (*name).to_owned(), args.to_string()))
            .collect(),
    )
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        _tools: &[ToolDefinition],
    ) -> Result<ChatResponseWithTools, AppError> {
        self.tool_requests.lock().unwrap().push(request.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Text("Done.".to_owned()));

        let (content, tool_calls) = match next {
            Scripted::Text(text) => (Some(text), Vec::new()),
            Scripted::Tools(calls) => (
                None,
                calls
                    .into_iter()
                    .map(|(id, name, arguments)| ToolCall {
                        id,
                        name,
                        arguments,
                    })
                    .collect(),
            ),
            Scripted::Fail(message) => {
                return Err(AppError::external_service("LLM", message));
            }
        };
        Ok(ChatResponseWithTools {
            content,
            tool_calls,
            model: request.model.clone().unwrap_or_default(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.stream_requests.lock().unwrap().push(request.clone());
        let script = self.stream.lock().unwrap().clone();
        let items: Vec<Result<StreamChunk, AppError>> = match script {
            StreamScript::Deltas(deltas) => deltas
                .into_iter()
                .map(|delta| {
                    Ok(StreamChunk {
                        delta,
                        is_final: false,
                        finish_reason: None,
                    })
                })
                .chain(iter::once(Ok(StreamChunk {
                    delta: String::new(),
                    is_final: true,
                    finish_reason: Some("stop".to_owned()),
                })))
                .collect(),
            StreamScript::FailAfter(deltas, message) => deltas
                .into_iter()
                .map(|delta| {
                    Ok(StreamChunk {
                        delta,
                        is_final: false,
                        finish_reason: None,
                    })
                })
                .chain(iter::once(Err(AppError::external_service(
                    "LLM", message,
                ))))
                .collect(),
        };
        Ok(Box::pin(stream::iter(items)))
    }
}

// ============================================================================
// In-memory CRM
// ============================================================================

/// CRM data source backed by in-process tables
#[derive(Default)]
pub struct MemoryCrm {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
    /// `(operation, table)` in call order
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MemoryCrm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a table with rows
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
    }

    /// Make every operation on `table` fail
    pub fn fail_table(&self, table: &str) {
        self.failing.lock().unwrap().push(table.to_owned());
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn call_log(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, table: &str) -> AppResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((op.to_owned(), table.to_owned()));
        if self.failing.lock().unwrap().iter().any(|t| t == table) {
            return Err(AppError::external_service(
                "CRM",
                format!("{table} is unavailable"),
            ));
        }
        Ok(())
    }
}

fn field_as_string(row: &Value, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl CrmDataSource for MemoryCrm {
    async fn read(
        &self,
        table: &str,
        query: &CrmQuery,
        _auth_context: &str,
    ) -> AppResult<Vec<Value>> {
        self.record("read", table)?;
        let rows = self.rows(table);
        let search = query.search.as_deref().map(str::to_lowercase);
        Ok(rows
            .into_iter()
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|(field, value)| field_as_string(row, field).as_deref() == Some(value))
            })
            .filter(|row| {
                search
                    .as_deref()
                    .map_or(true, |needle| row.to_string().to_lowercase().contains(needle))
            })
            .take(query.limit)
            .collect())
    }

    async fn create(
        &self,
        table: &str,
        fields: Map<String, Value>,
        _auth_context: &str,
    ) -> AppResult<Value> {
        self.record("create", table)?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let mut record = fields;
        record.insert("id".to_owned(), json!(format!("{table}-{id}")));
        let record = Value::Object(record);
        self.seed(table, vec![record.clone()]);
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
        _auth_context: &str,
    ) -> AppResult<Value> {
        self.record("update", table)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_owned()).or_default();
        let Some(row) = rows
            .iter_mut()
            .find(|row| field_as_string(row, "id").as_deref() == Some(id))
        else {
            return Err(AppError::not_found(format!("{table} record")));
        };
        if let Value::Object(existing) = row {
            existing.extend(fields);
        }
        Ok(row.clone())
    }
}

// ============================================================================
// Auth and analytics fakes
// ============================================================================

/// Auth provider accepting fixed bearer tokens
#[derive(Default)]
pub struct StaticAuth {
    tokens: HashMap<String, String>,
}

impl StaticAuth {
    /// Accept `token` as `user_id`
    pub fn with_user(mut self, token: &str, user_id: &str) -> Self {
        self.tokens.insert(token.to_owned(), user_id.to_owned());
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn get_session_user(
        &self,
        credentials: &RequestCredentials,
    ) -> AppResult<Option<Principal>> {
        Ok(credentials
            .bearer
            .as_ref()
            .and_then(|token| self.tokens.get(token))
            .map(|user_id| Principal {
                user_id: user_id.clone(),
                email: None,
            }))
    }
}

/// Analytics sink that keeps every record
#[derive(Default)]
pub struct RecordingAnalytics {
    pub turns: Mutex<Vec<TurnRecord>>,
}

impl RecordingAnalytics {
    pub fn turn_count(&self) -> usize {
        self.turns.lock().unwrap().len()
    }

    /// Recorded turn by position
    pub fn turn(&self, index: usize) -> TurnRecord {
        self.turns.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingAnalytics {
    async fn record_turn(&self, turn: &TurnRecord) -> AppResult<()> {
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }
}

// ============================================================================
// Configuration and resources
// ============================================================================

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_USER: &str = "user-1";
pub const OTHER_TOKEN: &str = "other-token";
pub const OTHER_USER: &str = "user-2";

/// Configuration with in-memory backends and local collaborator URLs
pub fn test_config() -> ServerConfig {
    let llm = LlmConfig {
        api_key: Some("test-key".to_owned()),
        ..LlmConfig::default()
    };
    ServerConfig {
        http_port: 0,
        environment: Environment::default(),
        cors_origins: Vec::new(),
        speech: SpeechConfig {
            base_url: "http://127.0.0.1:9".to_owned(),
            api_key: None,
            tts_model: "tts-1".to_owned(),
            tts_voice: "alloy".to_owned(),
            stt_model: "whisper-1".to_owned(),
        },
        llm,
        collaborators: CollaboratorConfig {
            crm_api_url: "http://127.0.0.1:9".to_owned(),
            crm_service_key: None,
            auth_api_url: "http://127.0.0.1:9".to_owned(),
        },
        cache: CacheConfig {
            enable_background_cleanup: false,
            ..CacheConfig::default()
        },
        rate_limit: RateLimitConfig::default(),
        session: SessionConfig::default(),
        response_cache: ResponseCacheConfig::default(),
    }
}

/// Handles kept by tests to inspect side effects
pub struct TestHarness {
    pub resources: Arc<ServerResources>,
    pub crm: Arc<MemoryCrm>,
    pub analytics: Arc<RecordingAnalytics>,
}

/// Build resources around the given provider and configuration
pub fn build_harness(
    provider: Option<Arc<dyn LlmProvider>>,
    config: ServerConfig,
) -> TestHarness {
    init_test_logging();
    let crm = MemoryCrm::new();
    let analytics = Arc::new(RecordingAnalytics::default());
    let auth = StaticAuth::default()
        .with_user(TEST_TOKEN, TEST_USER)
        .with_user(OTHER_TOKEN, OTHER_USER);
    let rate_limiter = RateLimiter::in_memory(&config.rate_limit);

    let resources = ServerResourcesBuilder::new(config)
        .with_cache(Cache::in_memory(1_000))
        .with_rate_limiter(rate_limiter)
        .with_llm_provider(provider)
        .with_crm(crm.clone())
        .with_auth(Arc::new(auth))
        .with_analytics(analytics.clone())
        .build()
        .expect("test resources");

    TestHarness {
        resources: Arc::new(resources),
        crm,
        analytics,
    }
}

const POLL_ATTEMPTS: usize = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Wait until background persistence has recorded `expected` turns
pub async fn wait_for_turns(analytics: &RecordingAnalytics, expected: usize) -> bool {
    for _ in 0..POLL_ATTEMPTS {
        if analytics.turn_count() >= expected {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }
    false
}

/// Wait until background persistence has saved an assistant answer
pub async fn wait_for_assistant_reply(sessions: &SessionStore, session_id: &str) -> bool {
    for _ in 0..POLL_ATTEMPTS {
        let saved = sessions
            .peek(session_id)
            .await
            .ok()
            .flatten()
            .is_some_and(|session| {
                session
                    .conversation
                    .iter()
                    .any(|m| m.role == MessageRole::Assistant && m.tool_calls.is_empty())
            });
        if saved {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }
    false
}

/// Parse an SSE body into `(event, data)` pairs
pub fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_owned());
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data.push_str(payload.trim_start());
                }
            }
            let event = event?;
            Some((event, serde_json::from_str(&data).unwrap_or(Value::Null)))
        })
        .collect()
}
