// ABOUTME: Conversation session store with owner isolation, absolute TTL and history trimming
// ABOUTME: Persists sessions through the cache backend; corrupt or foreign records become fresh sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Session Store
//!
//! A session is keyed by the client-supplied session id and owned by one
//! principal. Lookups never fail for "soft" reasons: a missing, expired,
//! foreign-owned or undecodable record is replaced by a new empty session.
//!
//! Lifetime is absolute from `created_at`. Every write re-stores the record
//! with only the remaining lifetime, so appends never extend a session.
//!
//! Writes are last-writer-wins. Two concurrent turns on one session id can
//! drop each other's messages; a person speaks one utterance at a time, so
//! no version token is kept.

use crate::cache::{Cache, CacheKey};
use crate::config::SessionConfig;
use crate::errors::{AppResult, ErrorCode};
use crate::llm::{ChatMessage, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One ongoing conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Client-supplied conversation id
    pub session_id: String,
    /// Owning principal
    pub user_id: String,
    /// Messages in the order they are replayed to the model
    pub conversation: Vec<ChatMessage>,
    /// Creation time; the TTL runs from here
    pub created_at: DateTime<Utc>,
    /// Locale hint for replies
    #[serde(default)]
    pub language: Option<String>,
}

impl Session {
    /// New empty session owned by `user_id`
    #[must_use]
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            conversation: Vec::new(),
            created_at: Utc::now(),
            language: None,
        }
    }

    /// Lifetime left before the absolute TTL elapses
    #[must_use]
    pub fn remaining_ttl(&self, ttl: Duration) -> Duration {
        let age = (Utc::now() - self.created_at).to_std().unwrap_or_default();
        ttl.saturating_sub(age)
    }

    /// Whether the absolute TTL has elapsed
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.remaining_ttl(ttl).is_zero()
    }

    /// Number of non-system messages
    #[must_use]
    pub fn non_system_len(&self) -> usize {
        self.conversation.iter().filter(|m| !m.is_system()).count()
    }
}

/// Trim history so at most `max_non_system` non-system messages remain
///
/// System messages are always kept in place. The oldest non-system messages
/// go first; tool results left at the head without their requesting assistant
/// turn are dropped too, since providers reject orphaned tool messages.
pub fn trim_conversation(conversation: &mut Vec<ChatMessage>, max_non_system: usize) {
    let non_system: Vec<usize> = conversation
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.is_system())
        .map(|(i, _)| i)
        .collect();

    if non_system.len() <= max_non_system {
        return;
    }

    let mut first_kept = non_system.len() - max_non_system;
    while first_kept < non_system.len()
        && conversation[non_system[first_kept]].role == MessageRole::Tool
    {
        first_kept += 1;
    }
    let dropped: Vec<usize> = non_system[..first_kept].to_vec();

    let mut index = 0;
    conversation.retain(|_| {
        let keep = dropped.binary_search(&index).is_err();
        index += 1;
        keep
    });
}

/// Keyed conversation store backed by the shared cache
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache,
    ttl: Duration,
    max_messages: usize,
}

impl SessionStore {
    /// Create a store over the given cache backend
    #[must_use]
    pub fn new(cache: Cache, config: &SessionConfig) -> Self {
        Self {
            cache,
            ttl: config.ttl(),
            max_messages: config.max_messages,
        }
    }

    /// Absolute session lifetime
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Load a live session without creating one
    ///
    /// Expired and undecodable records read as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails
    pub async fn peek(&self, session_id: &str) -> AppResult<Option<Session>> {
        match self.cache.get::<Session>(&CacheKey::session(session_id)).await {
            Ok(Some(session)) if session.is_expired(self.ttl) => {
                debug!(session_id, "Session expired");
                Ok(None)
            }
            Ok(found) => Ok(found),
            Err(e) if e.code == ErrorCode::SerializationError => {
                warn!(session_id, error = %e, "Discarding corrupt session record");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Return the caller's session, creating a fresh one when needed
    ///
    /// A missing record, an expired record, an undecodable record and a
    /// record owned by someone else all produce a new empty session owned by
    /// `user_id`, which replaces whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails
    pub async fn get_session(&self, session_id: &str, user_id: &str) -> AppResult<Session> {
        if let Some(session) = self.peek(session_id).await? {
            if session.user_id == user_id {
                return Ok(session);
            }
            warn!(
                session_id,
                "Session owner mismatch, replacing with a new session"
            );
        }

        let session = Session::new(session_id, user_id);
        self.save(&session).await?;
        Ok(session)
    }

    /// Append a message to an existing session and trim its history
    ///
    /// Does nothing when the session is absent or expired; appends never
    /// create sessions.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails
    pub async fn add_message(&self, session_id: &str, message: ChatMessage) -> AppResult<()> {
        let Some(mut session) = self.peek(session_id).await? else {
            debug!(session_id, "Dropping message for absent session");
            return Ok(());
        };

        session.conversation.push(message);
        trim_conversation(&mut session.conversation, self.max_messages);
        self.save(&session).await
    }

    /// Update the session's language hint
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails
    pub async fn set_language(&self, session_id: &str, language: Option<String>) -> AppResult<()> {
        let Some(mut session) = self.peek(session_id).await? else {
            return Ok(());
        };
        if session.language == language {
            return Ok(());
        }
        session.language = language;
        self.save(&session).await
    }

    /// Delete a session
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails
    pub async fn clear_session(&self, session_id: &str) -> AppResult<()> {
        self.cache.invalidate(&CacheKey::session(session_id)).await
    }

    async fn save(&self, session: &Session) -> AppResult<()> {
        let remaining = session.remaining_ttl(self.ttl).max(Duration::from_secs(1));
        self.cache
            .set(&CacheKey::session(&session.session_id), session, remaining)
            .await
    }
}
