// ABOUTME: Navigation tool resolving spoken page names to CRM routes
// ABOUTME: Case-insensitive lookup against a fixed route map
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{str_arg, ClientAction, ToolOutcome};
use serde_json::{Map, Value};

/// Navigable targets and their routes
pub const ROUTES: &[(&str, &str)] = &[
    ("dashboard", "/dashboard"),
    ("leads", "/leads"),
    ("contacts", "/contacts"),
    ("deals", "/pipeline"),
    ("pipeline", "/pipeline"),
    ("tasks", "/tasks"),
    ("calendar", "/calendar"),
    ("contracts", "/contracts"),
    ("reports", "/reports"),
    ("settings", "/settings"),
    ("billing", "/settings/billing"),
    ("portal", "/portal"),
];

/// Route for a target name, ignoring case and surrounding whitespace
#[must_use]
pub fn resolve_route(target: &str) -> Option<&'static str> {
    let wanted = target.trim();
    ROUTES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(_, route)| *route)
}

/// `navigate_to { target }`
pub(super) fn navigate_to(params: &Map<String, Value>) -> ToolOutcome {
    let Some(target) = str_arg(params, "target") else {
        return ToolOutcome::rejected("Missing required field: target");
    };

    let Some(route) = resolve_route(target) else {
        let known: Vec<&str> = ROUTES.iter().map(|(name, _)| *name).collect();
        return ToolOutcome::rejected(format!(
            "Unknown page '{target}'. Available pages: {}",
            known.join(", ")
        ));
    };

    let mut fields = Map::new();
    fields.insert("route".to_owned(), Value::String(route.to_owned()));
    ToolOutcome::ok(fields).with_action(ClientAction::Navigate {
        route: route.to_owned(),
        target: target.to_owned(),
    })
}
