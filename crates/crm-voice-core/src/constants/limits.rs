// ABOUTME: Input size ceilings and accepted audio media types
// ABOUTME: Used by the request validator before any model or tool work
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Maximum characters in a chat question
pub const MAX_QUESTION_CHARS: usize = 2_000;

/// Maximum characters accepted for text-to-speech
pub const MAX_TTS_CHARS: usize = 1_000;

/// Maximum uploaded audio size (5 MB)
pub const MAX_AUDIO_BYTES: usize = 5 * 1024 * 1024;

/// Audio MIME types accepted for transcription (codec parameters are ignored)
pub const ALLOWED_AUDIO_TYPES: &[&str] = &[
    "audio/webm",
    "audio/ogg",
    "audio/mpeg",
    "audio/mp3",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
    "audio/wav",
    "audio/x-wav",
];

/// Maximum rows a CRM list tool returns to the model
pub const MAX_TOOL_LIST_LIMIT: usize = 50;

/// Rows a CRM list tool returns when the model gives no limit
pub const DEFAULT_TOOL_LIST_LIMIT: usize = 10;
