// ABOUTME: Cost-tier model router mapping an utterance to fast, standard or reasoning
// ABOUTME: Pure and stateless; precedence between the rules is fixed and tested
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Greetings shorter than this many characters take the fast tier
const GREETING_MAX_CHARS: usize = 30;
/// Utterances longer than this many characters take the standard tier
const LONG_UTTERANCE_CHARS: usize = 200;

/// Cost and latency class of the model used for a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheapest, lowest latency
    Fast,
    /// Multi-part or long requests
    Standard,
    /// Analytical requests
    Reasoning,
}

impl ModelTier {
    /// Tier label as sent in the stream metadata frame
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Standard => "standard",
            Self::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn greeting_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)^(hi|hello|hey|good (morning|afternoon|evening)|what'?s up|yo)\b").ok()
        })
        .as_ref()
}

fn reasoning_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(analy[sz]e|why|explain|compare|recommend|strategy|forecast|predict|trend|correlation|root cause)",
            )
            .ok()
        })
        .as_ref()
}

/// Pick the model tier for an utterance
///
/// Rules, first match wins:
/// 1. a reasoning keyword anywhere routes to `Reasoning`, even inside a short greeting
/// 2. a greeting under 30 characters routes to `Fast`
/// 3. two or more `?` or more than 200 characters routes to `Standard`
/// 4. everything else routes to `Fast`
#[must_use]
pub fn select_model(utterance: &str) -> ModelTier {
    let text = utterance.trim();
    let length = text.chars().count();

    if reasoning_pattern().is_some_and(|re| re.is_match(text)) {
        return ModelTier::Reasoning;
    }

    if length < GREETING_MAX_CHARS && greeting_pattern().is_some_and(|re| re.is_match(text)) {
        return ModelTier::Fast;
    }

    if text.matches('?').count() >= 2 || length > LONG_UTTERANCE_CHARS {
        return ModelTier::Standard;
    }

    ModelTier::Fast
}
