// ABOUTME: Authentication collaborator that resolves a request's cookie or bearer token to a principal
// ABOUTME: HTTP implementation forwards the caller's credentials to the auth service session endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::service_names::AUTH_API;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const AUTH_TIMEOUT_SECS: u64 = 5;

/// Credentials as they arrived on the inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    /// Raw `Cookie` header
    pub cookie: Option<String>,
    /// Bearer token from `Authorization`
    pub bearer: Option<String>,
}

impl RequestCredentials {
    /// Whether the request presented anything at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cookie.is_none() && self.bearer.is_none()
    }

    /// Opaque value forwarded to the CRM data service for row scoping
    #[must_use]
    pub fn auth_context(&self) -> String {
        self.bearer
            .clone()
            .or_else(|| self.cookie.clone())
            .unwrap_or_default()
    }
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user id
    #[serde(alias = "id")]
    pub user_id: String,
    /// Email, when the auth service shares it
    #[serde(default)]
    pub email: Option<String>,
}

/// Authentication collaborator
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve credentials to a principal; `Ok(None)` means unauthenticated
    async fn get_session_user(&self, credentials: &RequestCredentials)
        -> AppResult<Option<Principal>>;
}

#[derive(Debug, Deserialize)]
struct SessionUserResponse {
    #[serde(default)]
    user: Option<Principal>,
}

/// Auth service client hitting `GET {base}/session`
pub struct HttpAuthProvider {
    http: Client,
    session_url: String,
}

impl HttpAuthProvider {
    /// Create a client for the given auth service base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: &str) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(AUTH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            session_url: format!("{}/session", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn get_session_user(
        &self,
        credentials: &RequestCredentials,
    ) -> AppResult<Option<Principal>> {
        if credentials.is_empty() {
            return Ok(None);
        }

        let mut request = self.http.get(&self.session_url);
        if let Some(cookie) = &credentials.cookie {
            request = request.header(COOKIE, cookie);
        }
        if let Some(token) = &credentials.bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::external_service(AUTH_API, format!("Request failed: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("Auth service rejected credentials");
                Ok(None)
            }
            status if status.is_success() => {
                let body: SessionUserResponse = response.json().await.map_err(|e| {
                    AppError::external_service(AUTH_API, format!("Invalid session response: {e}"))
                })?;
                Ok(body.user.filter(|user| !user.user_id.is_empty()))
            }
            status => {
                warn!(%status, "Auth service returned an unexpected status");
                Err(AppError::external_service(AUTH_API, format!("HTTP {status}")))
            }
        }
    }
}
