// ABOUTME: System prompt template for the voice agent, compiled into the binary
// ABOUTME: Renders page context, reply language and the current date into the template
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # System Prompts
//!
//! The prompt lives in a markdown file next to this module and is loaded with
//! `include_str!` so edits ship with the binary.

use chrono::Utc;

/// Voice agent system prompt template
pub const VOICE_AGENT_SYSTEM_PROMPT: &str = include_str!("voice_agent_system.md");

/// Language codes accepted on chat requests
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "es"];

/// Whether a language code is accepted on chat requests
#[must_use]
pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&code)
}

fn language_name(code: Option<&str>) -> &'static str {
    match code {
        Some("es") => "Spanish",
        _ => "English",
    }
}

/// Render the system prompt for one turn
///
/// A missing page path renders as `/`, a missing language as English.
#[must_use]
pub fn build_system_prompt(page_path: Option<&str>, language: Option<&str>) -> String {
    let page = page_path.filter(|p| !p.trim().is_empty()).unwrap_or("/");
    VOICE_AGENT_SYSTEM_PROMPT
        .replace("{{LANGUAGE}}", language_name(language))
        .replace("{{TODAY}}", &Utc::now().format("%A, %B %-d, %Y").to_string())
        .replace("{{PAGE_PATH}}", page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_placeholder() {
        let prompt = build_system_prompt(Some("/pipeline"), Some("es"));
        assert!(prompt.contains("`/pipeline`"));
        assert!(prompt.contains("Reply in Spanish."));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn defaults_to_root_page_and_english() {
        let prompt = build_system_prompt(None, None);
        assert!(prompt.contains("`/`"));
        assert!(prompt.contains("Reply in English."));
        assert!(!is_supported_language("fr"));
    }
}
