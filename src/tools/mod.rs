// ABOUTME: Closed set of agent tools, their argument parsing and structured outcomes
// ABOUTME: Navigation, UI-intent and CRM tool families share one dispatch table
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Agent Tools
//!
//! Every tool the model may call is a [`ToolName`] variant. The function
//! calling schema is generated from [`ToolName::ALL`] and dispatch matches on
//! the same enum, so adding a variant forces both a schema entry and a
//! handler. A name outside the enum is the one unchecked path and yields the
//! `Unknown tool` result.
//!
//! Handlers never fail the request. Problems come back as JSON with an
//! `error` field so the model can explain them to the user.

/// CRM read and write tools
pub mod crm;
/// Name to handler dispatch
pub mod dispatch;
/// Page navigation tool
pub mod navigation;
/// Function-calling schema for every tool
pub mod schema;
/// Screen-level UI intent tools
pub mod ui_actions;

pub use dispatch::ToolDispatcher;
pub use schema::tool_definitions;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every tool exposed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// Navigate to a CRM page
    NavigateTo,
    /// Apply a list filter on the current screen
    SetFilter,
    /// Run a search on the current screen
    Search,
    /// Open the create form
    OpenNew,
    /// Open the edit form for a record
    OpenEdit,
    /// Open the detail view for a record
    OpenView,
    /// List leads
    ListLeads,
    /// Create a lead
    CreateLead,
    /// Update a lead
    UpdateLead,
    /// List contacts
    ListContacts,
    /// Create a contact
    CreateContact,
    /// List deals
    ListDeals,
    /// Update a deal
    UpdateDeal,
    /// List tasks
    ListTasks,
    /// Create a task
    CreateTask,
}

/// Which handler family a tool belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    /// Emits a navigate client action
    Navigation,
    /// Emits a UI client action
    UiIntent,
    /// Reads or writes CRM records
    Crm,
}

impl ToolName {
    /// All tools in schema order
    pub const ALL: [Self; 15] = [
        Self::NavigateTo,
        Self::SetFilter,
        Self::Search,
        Self::OpenNew,
        Self::OpenEdit,
        Self::OpenView,
        Self::ListLeads,
        Self::CreateLead,
        Self::UpdateLead,
        Self::ListContacts,
        Self::CreateContact,
        Self::ListDeals,
        Self::UpdateDeal,
        Self::ListTasks,
        Self::CreateTask,
    ];

    /// Wire name used in the function-calling schema
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NavigateTo => "navigate_to",
            Self::SetFilter => "set_filter",
            Self::Search => "search",
            Self::OpenNew => "open_new",
            Self::OpenEdit => "open_edit",
            Self::OpenView => "open_view",
            Self::ListLeads => "list_leads",
            Self::CreateLead => "create_lead",
            Self::UpdateLead => "update_lead",
            Self::ListContacts => "list_contacts",
            Self::CreateContact => "create_contact",
            Self::ListDeals => "list_deals",
            Self::UpdateDeal => "update_deal",
            Self::ListTasks => "list_tasks",
            Self::CreateTask => "create_task",
        }
    }

    /// Resolve a wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// Handler family
    #[must_use]
    pub const fn family(&self) -> ToolFamily {
        match self {
            Self::NavigateTo => ToolFamily::Navigation,
            Self::SetFilter | Self::Search | Self::OpenNew | Self::OpenEdit | Self::OpenView => {
                ToolFamily::UiIntent
            }
            _ => ToolFamily::Crm,
        }
    }
}

/// Caller identity forwarded to tool handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    /// Authenticated principal
    pub user_id: String,
    /// Opaque credential forwarded to the CRM data service
    pub auth_context: String,
}

/// Instruction for the calling UI, flushed in the stream's metadata frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAction {
    /// Change page
    Navigate {
        /// Resolved route path
        route: String,
        /// Target name as the model supplied it
        target: String,
    },
    /// Act on the current screen
    UiAction {
        /// Record area the action applies to
        scope: String,
        /// Which intent
        action: String,
        /// Only the fields relevant to the intent
        payload: Value,
    },
}

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    /// JSON object fed back to the model
    pub payload: Map<String, Value>,
    /// Action for the UI, if any
    pub client_action: Option<ClientAction>,
}

impl ToolOutcome {
    /// Successful outcome with the given fields plus `ok: true`
    #[must_use]
    pub fn ok(mut fields: Map<String, Value>) -> Self {
        fields.insert("ok".to_owned(), Value::Bool(true));
        Self {
            payload: fields,
            client_action: None,
        }
    }

    /// `{error: message}`
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("error".to_owned(), Value::String(message.into()));
        Self {
            payload,
            client_action: None,
        }
    }

    /// `{ok: false, error: message}` for rejected intents
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        let mut outcome = Self::error(message);
        outcome.payload.insert("ok".to_owned(), Value::Bool(false));
        outcome
    }

    /// Attach a client action
    #[must_use]
    pub fn with_action(mut self, action: ClientAction) -> Self {
        self.client_action = Some(action);
        self
    }

    /// Whether this outcome reports an error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.payload.contains_key("error")
    }

    /// JSON fed back to the model, with `client_action` merged in
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut payload = self.payload.clone();
        if let Some(action) = &self.client_action {
            if let Ok(value) = serde_json::to_value(action) {
                payload.insert("client_action".to_owned(), value);
            }
        }
        Value::Object(payload)
    }
}

/// Tool arguments after defensive parsing
///
/// Models occasionally emit invalid JSON. That is not an error: the call runs
/// with no arguments, and handlers report whatever required field is missing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedArgs {
    /// A JSON object
    Parsed(Map<String, Value>),
    /// Anything else, kept for logging
    Malformed {
        /// Argument text as received
        raw: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ParsedArgs {
    /// Parse a raw argument string; blank input is an empty object
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Parsed(Map::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::Parsed(map),
            Ok(other) => Self::Malformed {
                raw: raw.to_owned(),
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            },
            Err(e) => Self::Malformed {
                raw: raw.to_owned(),
                reason: e.to_string(),
            },
        }
    }

    /// Arguments to dispatch with; malformed input becomes an empty object
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        match self {
            Self::Parsed(map) => map,
            Self::Malformed { .. } => Map::new(),
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Trimmed non-empty string argument
pub(crate) fn str_arg<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// String-or-number identifier argument
pub(crate) fn id_arg(params: &Map<String, Value>, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
