// ABOUTME: Function-calling schema for every agent tool, generated from the tool enum
// ABOUTME: CRM tool parameters come from the same table specs the handlers use
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::crm::{self, CrmOperation, FieldSpec};
use super::navigation::ROUTES;
use super::ui_actions::SCOPES;
use super::ToolName;
use crate::constants::limits::MAX_TOOL_LIST_LIMIT;
use crate::llm::ToolDefinition;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

static DEFINITIONS: OnceLock<Vec<ToolDefinition>> = OnceLock::new();

/// Schema for every tool, in [`ToolName::ALL`] order
#[must_use]
pub fn tool_definitions() -> &'static [ToolDefinition] {
    DEFINITIONS.get_or_init(|| ToolName::ALL.into_iter().map(definition).collect())
}

/// Schema entry for one tool
#[must_use]
pub fn definition(tool: ToolName) -> ToolDefinition {
    ToolDefinition {
        name: tool.as_str().to_owned(),
        description: description(tool).to_owned(),
        parameters: parameters(tool),
    }
}

fn description(tool: ToolName) -> &'static str {
    match tool {
        ToolName::NavigateTo => "Navigate the user to a page of the CRM.",
        ToolName::SetFilter => "Apply a filter to the list on the current screen.",
        ToolName::Search => "Search the list on the current screen.",
        ToolName::OpenNew => "Open the form to create a new record.",
        ToolName::OpenEdit => "Open the edit form for an existing record, by id or by name.",
        ToolName::OpenView => "Open the detail view of an existing record, by id or by name.",
        ToolName::ListLeads => "List the user's leads, optionally filtered or searched.",
        ToolName::CreateLead => "Create a new lead.",
        ToolName::UpdateLead => "Update fields of an existing lead.",
        ToolName::ListContacts => "List the user's contacts, optionally filtered or searched.",
        ToolName::CreateContact => "Create a new contact.",
        ToolName::ListDeals => "List deals in the pipeline, optionally filtered by stage.",
        ToolName::UpdateDeal => "Update an existing deal, for example to move its stage.",
        ToolName::ListTasks => "List the user's tasks, optionally filtered.",
        ToolName::CreateTask => "Create a new task or reminder.",
    }
}

fn object(properties: Map<String, Value>, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn property(kind: &str, description: &str) -> Value {
    json!({ "type": kind, "description": description })
}

fn scope_property() -> Value {
    json!({
        "type": "string",
        "enum": SCOPES,
        "description": "Which record area the action applies to",
    })
}

fn field_properties(fields: &[FieldSpec]) -> Map<String, Value> {
    fields
        .iter()
        .map(|f| {
            (
                f.name.to_owned(),
                property(f.kind.schema_type(), f.description),
            )
        })
        .collect()
}

fn parameters(tool: ToolName) -> Value {
    if let Some(op) = crm::operation(tool) {
        return crm_parameters(op);
    }

    let mut props = Map::new();
    match tool {
        ToolName::NavigateTo => {
            let targets: Vec<&str> = ROUTES.iter().map(|(name, _)| *name).collect();
            props.insert(
                "target".to_owned(),
                json!({
                    "type": "string",
                    "enum": targets,
                    "description": "Page to open",
                }),
            );
            return object(props, &["target"]);
        }
        ToolName::SetFilter => {
            props.insert("scope".to_owned(), scope_property());
            props.insert(
                "filter".to_owned(),
                property("string", "Filter value, e.g. a status or stage name"),
            );
            return object(props, &["scope", "filter"]);
        }
        ToolName::Search => {
            props.insert("scope".to_owned(), scope_property());
            props.insert("query".to_owned(), property("string", "Search text"));
            return object(props, &["scope", "query"]);
        }
        ToolName::OpenEdit | ToolName::OpenView => {
            props.insert("scope".to_owned(), scope_property());
            props.insert("id".to_owned(), property("string", "Record id, if known"));
            props.insert(
                "query".to_owned(),
                property("string", "Name to look the record up by, if the id is unknown"),
            );
        }
        _ => {
            props.insert("scope".to_owned(), scope_property());
        }
    }
    object(props, &["scope"])
}

fn crm_parameters(op: CrmOperation) -> Value {
    match op {
        CrmOperation::List { filters, .. } => {
            let mut props = field_properties(filters);
            props.insert(
                "query".to_owned(),
                property("string", "Free-text search across names and emails"),
            );
            props.insert(
                "limit".to_owned(),
                json!({
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_TOOL_LIST_LIMIT,
                    "description": "Maximum number of rows",
                }),
            );
            object(props, &[])
        }
        CrmOperation::Create {
            fields, required, ..
        } => object(field_properties(fields), required),
        CrmOperation::Update { fields, .. } => {
            let mut props = field_properties(fields);
            props.insert("id".to_owned(), property("string", "Id of the record to update"));
            object(props, &["id"])
        }
    }
}
