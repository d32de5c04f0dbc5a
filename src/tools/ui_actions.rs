// ABOUTME: UI intent tools that act on the current screen instead of the data
// ABOUTME: Each emits a ui_action client action whose payload holds only the relevant fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{id_arg, str_arg, ClientAction, ToolName, ToolOutcome};
use serde_json::{Map, Value};

/// Record areas a UI intent can target
pub const SCOPES: &[&str] = &["leads", "contacts", "deals", "tasks", "contracts"];

/// Run one UI intent
pub(super) fn run(tool: ToolName, params: &Map<String, Value>) -> ToolOutcome {
    let Some(scope) = str_arg(params, "scope").map(str::to_ascii_lowercase) else {
        return ToolOutcome::rejected("Missing required field: scope");
    };
    if !SCOPES.contains(&scope.as_str()) {
        return ToolOutcome::rejected(format!(
            "Unknown scope '{scope}'. Expected one of: {}",
            SCOPES.join(", ")
        ));
    }

    let mut payload = Map::new();
    match tool {
        ToolName::SetFilter => {
            let Some(filter) = str_arg(params, "filter") else {
                return ToolOutcome::rejected("Missing required field: filter");
            };
            payload.insert("filter".to_owned(), Value::String(filter.to_owned()));
        }
        ToolName::Search => {
            let Some(query) = str_arg(params, "query") else {
                return ToolOutcome::rejected("Missing required field: query");
            };
            payload.insert("query".to_owned(), Value::String(query.to_owned()));
        }
        ToolName::OpenEdit | ToolName::OpenView => {
            let id = id_arg(params, "id");
            let query = str_arg(params, "query");
            if id.is_none() && query.is_none() {
                return ToolOutcome::rejected("Provide either id or query to pick the record");
            }
            if let Some(id) = id {
                payload.insert("id".to_owned(), Value::String(id));
            }
            if let Some(query) = query {
                payload.insert("query".to_owned(), Value::String(query.to_owned()));
            }
        }
        _ => {}
    }

    ToolOutcome::ok(Map::new()).with_action(ClientAction::UiAction {
        scope,
        action: tool.as_str().to_owned(),
        payload: Value::Object(payload),
    })
}
