// ABOUTME: Clients for the services the voice agent consumes but does not own
// ABOUTME: Authentication, CRM data, speech and turn analytics behind narrow traits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! External collaborators
//!
//! Each collaborator is a trait with one HTTP implementation. Request
//! handling only sees the traits, so tests swap in deterministic fakes.

/// Turn analytics sink
pub mod analytics;
/// Session resolution against the auth service
pub mod auth_client;
/// CRM data service
pub mod crm_client;
/// Text-to-speech and speech-to-text
pub mod speech_client;

pub use analytics::{AnalyticsSink, CrmAnalyticsSink, TurnRecord};
pub use auth_client::{AuthProvider, HttpAuthProvider, Principal, RequestCredentials};
pub use crm_client::{CrmDataSource, CrmQuery, HttpCrmClient};
pub use speech_client::SpeechClient;
