// ABOUTME: Request validation for questions, speech text and uploaded audio
// ABOUTME: Sanitizes control characters and screens for prompt-injection phrasing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Request Validation
//!
//! Validators run before any model or tool work. Text validators accept a raw
//! JSON value so a non-string `question` is rejected with a specific message
//! rather than a generic body parse failure.
//!
//! Prompt-injection screening is advisory: it reports the first matching
//! heuristic so the caller can log it, and never blocks the request.

use crate::constants::limits::{
    ALLOWED_AUDIO_TYPES, MAX_AUDIO_BYTES, MAX_QUESTION_CHARS, MAX_TTS_CHARS,
};
use crate::errors::{AppError, AppResult};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Outcome of validating one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Whether the input is acceptable
    pub valid: bool,
    /// Reason for rejection, suitable for returning to the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Cleaned input, present only when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized: Option<String>,
}

impl ValidationOutcome {
    fn accept(sanitized: String) -> Self {
        Self {
            valid: true,
            error: None,
            sanitized: Some(sanitized),
        }
    }

    fn reject(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            sanitized: None,
        }
    }

    /// Convert into a result, mapping rejection to a 400 `InvalidInput` error
    ///
    /// # Errors
    ///
    /// Returns `AppError::invalid_input` with the validator message when invalid
    pub fn into_result(self) -> AppResult<String> {
        match (self.valid, self.sanitized) {
            (true, Some(sanitized)) => Ok(sanitized),
            _ => Err(AppError::invalid_input(
                self.error.unwrap_or_else(|| "Invalid input".to_owned()),
            )),
        }
    }
}

/// Validate a chat question (max 2000 characters)
#[must_use]
pub fn validate_question(input: &Value) -> ValidationOutcome {
    validate_text(input, "Question", MAX_QUESTION_CHARS)
}

/// Validate text sent to speech synthesis (max 1000 characters)
#[must_use]
pub fn validate_tts_text(input: &Value) -> ValidationOutcome {
    validate_text(input, "Text", MAX_TTS_CHARS)
}

fn validate_text(input: &Value, field: &str, max_chars: usize) -> ValidationOutcome {
    let Some(text) = input.as_str() else {
        return ValidationOutcome::reject(format!("{field} must be a string"));
    };

    if text.trim().is_empty() {
        return ValidationOutcome::reject(format!("{field} cannot be empty"));
    }

    if text.chars().count() > max_chars {
        return ValidationOutcome::reject(format!(
            "{field} is too long (maximum {max_chars} characters)"
        ));
    }

    let sanitized = sanitize_text(text);
    if sanitized.is_empty() {
        return ValidationOutcome::reject(format!("{field} cannot be empty"));
    }

    ValidationOutcome::accept(sanitized)
}

/// Strip control characters and collapse whitespace runs to single spaces
///
/// Leading and trailing whitespace is dropped.
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}

/// Result of prompt-injection screening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InjectionCheck {
    /// Whether any heuristic matched
    pub detected: bool,
    /// Label of the first matching heuristic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<&'static str>,
}

/// Ordered heuristics; the first match wins
const INJECTION_PATTERNS: &[(&str, &str)] = &[
    (
        r"(?i)\b(you are now|from now on you are|act as (a|an|the)\b|pretend (to be|you are)|roleplay as)",
        "Role override attempt",
    ),
    (
        r"(?i)\b(ignore|disregard|forget)\s+(all\s+)?(the\s+|your\s+)?(previous|prior|above|earlier)\s+(instructions|prompts|rules|messages)",
        "Instruction override attempt",
    ),
    (
        r"(?i)(^|\n)\s*(system|assistant)\s*:|\[\s*system\s*\]|<\|?\s*(system|im_start)\s*\|?>",
        "Fake system message",
    ),
    (
        r"(?i)\b(security|system|admin(istrator)?)\s+(update|override|notice|alert)\b",
        "Fabricated security update",
    ),
];

fn injection_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        INJECTION_PATTERNS
            .iter()
            .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, *label)))
            .collect()
    })
}

/// Screen text for prompt-injection phrasing
#[must_use]
pub fn detect_prompt_injection(text: &str) -> InjectionCheck {
    injection_patterns()
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map_or(
            InjectionCheck {
                detected: false,
                pattern: None,
            },
            |(_, label)| InjectionCheck {
                detected: true,
                pattern: Some(label),
            },
        )
}

/// Validate an uploaded audio payload by size and MIME type
///
/// Codec parameters are ignored, so `audio/webm;codecs=opus` matches
/// `audio/webm`. On success `sanitized` carries the bare MIME type.
#[must_use]
pub fn validate_audio_file(size_bytes: usize, mime_type: &str) -> ValidationOutcome {
    if size_bytes == 0 {
        return ValidationOutcome::reject("Audio file is empty");
    }

    if size_bytes > MAX_AUDIO_BYTES {
        return ValidationOutcome::reject(format!(
            "Audio file is too large (maximum {} MB)",
            MAX_AUDIO_BYTES / (1024 * 1024)
        ));
    }

    let base_type = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !ALLOWED_AUDIO_TYPES.contains(&base_type.as_str()) {
        return ValidationOutcome::reject(format!(
            "Unsupported audio type '{}'",
            if base_type.is_empty() { "unknown" } else { &base_type }
        ));
    }

    ValidationOutcome::accept(base_type)
}
