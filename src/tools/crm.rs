// ABOUTME: CRM tools that list, create and update leads, contacts, deals and tasks
// ABOUTME: Table specs drive both argument handling and the function-calling schema
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{id_arg, str_arg, ToolContext, ToolName, ToolOutcome};
use crate::constants::limits::{DEFAULT_TOOL_LIST_LIMIT, MAX_TOOL_LIST_LIMIT};
use crate::external::{CrmDataSource, CrmQuery};
use serde_json::{Map, Value};
use tracing::warn;

/// JSON type of a tool field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text or an enumerated word
    Text,
    /// Numeric amount or percentage
    Number,
}

impl FieldKind {
    /// JSON schema type name
    #[must_use]
    pub const fn schema_type(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Number => "number",
        }
    }
}

/// One column a tool may read or write
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Column name
    pub name: &'static str,
    /// JSON type
    pub kind: FieldKind,
    /// Hint shown to the model
    pub description: &'static str,
}

const fn text(name: &'static str, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
        description,
    }
}

const fn number(name: &'static str, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Number,
        description,
    }
}

const LEAD_FIELDS: &[FieldSpec] = &[
    text("name", "Full name of the lead"),
    text("email", "Email address"),
    text("phone", "Phone number"),
    text("company", "Company name"),
    text("status", "One of new, contacted, qualified, lost"),
    text("source", "Where the lead came from"),
    number("value", "Estimated value"),
    text("notes", "Free-form notes"),
];

const CONTACT_FIELDS: &[FieldSpec] = &[
    text("name", "Full name of the contact"),
    text("email", "Email address"),
    text("phone", "Phone number"),
    text("company", "Company name"),
    text("title", "Job title"),
    text("notes", "Free-form notes"),
];

const DEAL_FIELDS: &[FieldSpec] = &[
    text("title", "Deal title"),
    text("stage", "Pipeline stage, e.g. prospecting, proposal, negotiation, won, lost"),
    number("value", "Deal amount"),
    number("probability", "Win probability from 0 to 100"),
    text("close_date", "Expected close date (YYYY-MM-DD)"),
    text("notes", "Free-form notes"),
];

const TASK_FIELDS: &[FieldSpec] = &[
    text("title", "What needs to be done"),
    text("description", "Details"),
    text("due_date", "Due date (YYYY-MM-DD)"),
    text("priority", "One of low, medium, high"),
    text("status", "One of todo, in_progress, done"),
];

/// How a CRM tool touches its table
#[derive(Debug, Clone, Copy)]
pub enum CrmOperation {
    /// Filtered read
    List {
        /// Table name
        table: &'static str,
        /// Exact-match filter columns
        filters: &'static [FieldSpec],
    },
    /// Insert with required columns
    Create {
        /// Table name
        table: &'static str,
        /// Writable columns
        fields: &'static [FieldSpec],
        /// Columns that must be present
        required: &'static [&'static str],
    },
    /// Partial update by id
    Update {
        /// Table name
        table: &'static str,
        /// Writable columns
        fields: &'static [FieldSpec],
    },
}

const LEAD_FILTERS: &[FieldSpec] = &[
    text("status", "Only leads with this status"),
    text("source", "Only leads from this source"),
];
const CONTACT_FILTERS: &[FieldSpec] = &[text("company", "Only contacts at this company")];
const DEAL_FILTERS: &[FieldSpec] = &[text("stage", "Only deals in this stage")];
const TASK_FILTERS: &[FieldSpec] = &[
    text("status", "Only tasks with this status"),
    text("priority", "Only tasks with this priority"),
];

/// Table operation for a CRM tool; `None` for navigation and UI tools
#[must_use]
pub const fn operation(tool: ToolName) -> Option<CrmOperation> {
    Some(match tool {
        ToolName::ListLeads => CrmOperation::List {
            table: "leads",
            filters: LEAD_FILTERS,
        },
        ToolName::CreateLead => CrmOperation::Create {
            table: "leads",
            fields: LEAD_FIELDS,
            required: &["name"],
        },
        ToolName::UpdateLead => CrmOperation::Update {
            table: "leads",
            fields: LEAD_FIELDS,
        },
        ToolName::ListContacts => CrmOperation::List {
            table: "contacts",
            filters: CONTACT_FILTERS,
        },
        ToolName::CreateContact => CrmOperation::Create {
            table: "contacts",
            fields: CONTACT_FIELDS,
            required: &["name"],
        },
        ToolName::ListDeals => CrmOperation::List {
            table: "deals",
            filters: DEAL_FILTERS,
        },
        ToolName::UpdateDeal => CrmOperation::Update {
            table: "deals",
            fields: DEAL_FIELDS,
        },
        ToolName::ListTasks => CrmOperation::List {
            table: "tasks",
            filters: TASK_FILTERS,
        },
        ToolName::CreateTask => CrmOperation::Create {
            table: "tasks",
            fields: TASK_FIELDS,
            required: &["title"],
        },
        ToolName::NavigateTo
        | ToolName::SetFilter
        | ToolName::Search
        | ToolName::OpenNew
        | ToolName::OpenEdit
        | ToolName::OpenView => return None,
    })
}

/// List limit from the model's arguments, defaulted and clamped
#[must_use]
pub fn list_limit(params: &Map<String, Value>) -> usize {
    let requested = match params.get("limit") {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    requested.map_or(DEFAULT_TOOL_LIST_LIMIT, |n| {
        usize::try_from(n)
            .unwrap_or(MAX_TOOL_LIST_LIMIT)
            .clamp(1, MAX_TOOL_LIST_LIMIT)
    })
}

/// Run a CRM tool against the data service
pub(super) async fn run(
    tool: ToolName,
    params: &Map<String, Value>,
    context: &ToolContext,
    crm: &dyn CrmDataSource,
) -> ToolOutcome {
    let Some(op) = operation(tool) else {
        return ToolOutcome::error(format!("Unknown tool: {}", tool.as_str()));
    };

    match op {
        CrmOperation::List { table, filters } => list(table, filters, params, context, crm).await,
        CrmOperation::Create {
            table,
            fields,
            required,
        } => create(table, fields, required, params, context, crm).await,
        CrmOperation::Update { table, fields } => update(table, fields, params, context, crm).await,
    }
}

async fn list(
    table: &str,
    filters: &[FieldSpec],
    params: &Map<String, Value>,
    context: &ToolContext,
    crm: &dyn CrmDataSource,
) -> ToolOutcome {
    let mut query = CrmQuery::with_limit(list_limit(params))
        .search(str_arg(params, "query").or_else(|| str_arg(params, "search")));
    for spec in filters {
        if let Some(value) = scalar_arg(params, spec.name) {
            query = query.filter(spec.name, value);
        }
    }

    match crm.read(table, &query, &context.auth_context).await {
        Ok(rows) => {
            let mut fields = Map::new();
            fields.insert("count".to_owned(), Value::from(rows.len()));
            fields.insert("items".to_owned(), Value::Array(rows));
            ToolOutcome::ok(fields)
        }
        Err(e) => {
            warn!(table, user_id = %context.user_id, "CRM read failed: {e}");
            ToolOutcome::error(e.message)
        }
    }
}

async fn create(
    table: &str,
    fields: &[FieldSpec],
    required: &[&str],
    params: &Map<String, Value>,
    context: &ToolContext,
    crm: &dyn CrmDataSource,
) -> ToolOutcome {
    if let Some(missing) = required.iter().find(|name| !has_value(params, name)) {
        return ToolOutcome::error(format!("Missing required field: {missing}"));
    }

    let mut record = writable_fields(fields, params);
    record.insert("user_id".to_owned(), Value::String(context.user_id.clone()));

    match crm.create(table, record, &context.auth_context).await {
        Ok(created) => {
            let mut result = Map::new();
            result.insert("record".to_owned(), created);
            ToolOutcome::ok(result)
        }
        Err(e) => {
            warn!(table, user_id = %context.user_id, "CRM create failed: {e}");
            ToolOutcome::error(e.message)
        }
    }
}

async fn update(
    table: &str,
    fields: &[FieldSpec],
    params: &Map<String, Value>,
    context: &ToolContext,
    crm: &dyn CrmDataSource,
) -> ToolOutcome {
    let Some(id) = id_arg(params, "id") else {
        return ToolOutcome::error("Missing required field: id");
    };
    let changes = writable_fields(fields, params);
    if changes.is_empty() {
        return ToolOutcome::error("No fields to update");
    }

    match crm.update(table, &id, changes, &context.auth_context).await {
        Ok(updated) => {
            let mut result = Map::new();
            result.insert("record".to_owned(), updated);
            ToolOutcome::ok(result)
        }
        Err(e) => {
            warn!(table, record_id = %id, user_id = %context.user_id, "CRM update failed: {e}");
            ToolOutcome::error(e.message)
        }
    }
}

/// Allowed columns present in the arguments; unknown keys and nulls are dropped
fn writable_fields(fields: &[FieldSpec], params: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|spec| {
            let value = params.get(spec.name)?;
            let value = match (spec.kind, value) {
                (_, Value::Null) => return None,
                (FieldKind::Text, Value::String(s)) => Value::String(s.trim().to_owned()),
                (FieldKind::Number, Value::String(s)) => {
                    s.trim().parse::<f64>().map_or(Value::Null, Value::from)
                }
                (_, other) => other.clone(),
            };
            (!value.is_null()).then(|| (spec.name.to_owned(), value))
        })
        .collect()
}

fn has_value(params: &Map<String, Value>, key: &str) -> bool {
    match params.get(key) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

fn scalar_arg(params: &Map<String, Value>, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => str_arg(params, key).map(str::to_owned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolFamily;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn list_limit_defaults_and_clamps() {
        assert_eq!(list_limit(&Map::new()), DEFAULT_TOOL_LIST_LIMIT);
        assert_eq!(list_limit(&args(json!({"limit": 5}))), 5);
        assert_eq!(list_limit(&args(json!({"limit": 500}))), MAX_TOOL_LIST_LIMIT);
        assert_eq!(list_limit(&args(json!({"limit": 0}))), 1);
        assert_eq!(list_limit(&args(json!({"limit": "20"}))), 20);
        assert_eq!(list_limit(&args(json!({"limit": "lots"}))), DEFAULT_TOOL_LIST_LIMIT);
    }

    #[test]
    fn writable_fields_drop_unknown_and_null() {
        let params = args(json!({
            "name": "  Ada ",
            "value": "1200.5",
            "owner": "someone-else",
            "email": null
        }));
        let fields = writable_fields(LEAD_FIELDS, &params);
        assert_eq!(fields.get("name"), Some(&json!("Ada")));
        assert_eq!(fields.get("value"), Some(&json!(1200.5)));
        assert!(!fields.contains_key("owner"));
        assert!(!fields.contains_key("email"));
    }

    #[test]
    fn every_crm_tool_has_an_operation() {
        for tool in ToolName::ALL {
            let is_crm = tool.family() == ToolFamily::Crm;
            assert_eq!(operation(tool).is_some(), is_crm, "{}", tool.as_str());
        }
    }
}
