// ABOUTME: Library root for the CRM voice agent orchestration core
// ABOUTME: Model routing, sessions, tool calling, SSE streaming, validation and rate limiting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # CRM Voice Agent
//!
//! Takes a natural-language utterance, routes it to a cost-tiered language
//! model, drives a bounded tool-calling loop against CRM data and streams the
//! answer back as server-sent events while persisting conversation state.
//!
//! A request flows: validation, rate limit, model tier, session, tool loop,
//! stream, then detached persistence.

/// Turn orchestration: tool loop, stream assembly, persistence, answer cache
pub mod agent;
/// Cache backends shared by sessions and the answer cache
pub mod cache;
/// Environment configuration
pub mod config;
/// Domain constants
pub mod constants;
/// Unified error types
pub mod errors;
/// Collaborator clients: auth, CRM data, speech, analytics
pub mod external;
/// Model providers, routing and prompts
pub mod llm;
/// Structured logging setup and domain log events
pub mod logging;
/// HTTP middleware
pub mod middleware;
/// Two-window rate limiting
pub mod rate_limiting;
/// Shared server resources
pub mod resources;
/// HTTP routes
pub mod routes;
/// Conversation store
pub mod session;
/// Agent tools and dispatch
pub mod tools;
/// Input validation and prompt-injection screening
pub mod validation;
