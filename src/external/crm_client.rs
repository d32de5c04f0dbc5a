// ABOUTME: CRM data collaborator interface and its REST client implementation
// ABOUTME: Generic read, create and update against named tables, scoped by the caller's credential
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! CRM data service client
//!
//! The CRM store enforces row-level access itself. This client only forwards
//! the caller's credential; it never widens access with the service key
//! alone.
//!
//! REST conventions:
//! - `GET {base}/{table}?limit=N&search=q&{field}={value}` returns an array
//!   (or `{"data": [...]}`)
//! - `POST {base}/{table}` with a JSON object returns the created record
//! - `PATCH {base}/{table}/{id}` with a JSON object returns the updated record

use crate::constants::service_names::CRM_API;
use crate::errors::{AppError, AppResult, ErrorCode};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout for CRM calls
const CRM_TIMEOUT_SECS: u64 = 15;

/// Filters for a table read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrmQuery {
    /// Exact-match field filters
    pub filters: Vec<(String, String)>,
    /// Free-text search
    pub search: Option<String>,
    /// Maximum rows
    pub limit: usize,
}

impl CrmQuery {
    /// Query returning at most `limit` rows
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            filters: Vec::new(),
            search: None,
            limit,
        }
    }

    /// Add an exact-match filter
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Set the free-text search
    #[must_use]
    pub fn search(mut self, text: Option<impl Into<String>>) -> Self {
        self.search = text.map(Into::into);
        self
    }
}

/// CRM data collaborator
#[async_trait]
pub trait CrmDataSource: Send + Sync {
    /// Read rows from a table
    async fn read(&self, table: &str, query: &CrmQuery, auth_context: &str)
        -> AppResult<Vec<Value>>;

    /// Create a row and return it
    async fn create(
        &self,
        table: &str,
        fields: Map<String, Value>,
        auth_context: &str,
    ) -> AppResult<Value>;

    /// Update a row by id and return it
    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
        auth_context: &str,
    ) -> AppResult<Value>;
}

/// REST client for the CRM data service
pub struct HttpCrmClient {
    http: Client,
    base_url: String,
    service_key: Option<String>,
}

impl HttpCrmClient {
    /// Create a client for the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, service_key: Option<String>) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(CRM_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            service_key,
        })
    }

    fn scoped(&self, request: RequestBuilder, auth_context: &str) -> RequestBuilder {
        let request = if auth_context.is_empty() {
            request
        } else {
            request.bearer_auth(auth_context)
        };
        match &self.service_key {
            Some(key) => request.header("X-Service-Key", key),
            None => request,
        }
    }

    async fn into_json(response: Response, table: &str) -> AppResult<Value> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                AppError::external_service(CRM_API, format!("Invalid response for {table}: {e}"))
            });
        }

        let body = response.text().await.unwrap_or_default();
        warn!(table, %status, "CRM request failed");
        Err(Self::status_error(status, table, &body))
    }

    fn status_error(status: StatusCode, table: &str, body: &str) -> AppError {
        let detail: String = body.chars().take(200).collect();
        match status {
            StatusCode::NOT_FOUND => AppError::not_found(format!("{table} record")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::new(
                ErrorCode::PermissionDenied,
                format!("Not allowed to access {table}"),
            ),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::invalid_input(format!("CRM rejected the {table} request: {detail}"))
            }
            _ => AppError::external_service(CRM_API, format!("HTTP {status}: {detail}")),
        }
    }

    fn send_error(e: &reqwest::Error) -> AppError {
        AppError::external_service(CRM_API, format!("Request failed: {e}"))
    }
}

#[async_trait]
impl CrmDataSource for HttpCrmClient {
    async fn read(
        &self,
        table: &str,
        query: &CrmQuery,
        auth_context: &str,
    ) -> AppResult<Vec<Value>> {
        let mut params: Vec<(String, String)> = query.filters.clone();
        params.push(("limit".to_owned(), query.limit.to_string()));
        if let Some(search) = &query.search {
            params.push(("search".to_owned(), search.clone()));
        }
        debug!(table, params = params.len(), "CRM read");

        let request = self
            .http
            .get(format!("{}/{table}", self.base_url))
            .query(&params);
        let response = self
            .scoped(request, auth_context)
            .send()
            .await
            .map_err(|e| Self::send_error(&e))?;

        match Self::into_json(response, table).await? {
            Value::Array(rows) => Ok(rows),
            Value::Object(mut envelope) => match envelope.remove("data") {
                Some(Value::Array(rows)) => Ok(rows),
                _ => Err(AppError::external_service(
                    CRM_API,
                    format!("Expected a list of {table}"),
                )),
            },
            _ => Err(AppError::external_service(
                CRM_API,
                format!("Expected a list of {table}"),
            )),
        }
    }

    async fn create(
        &self,
        table: &str,
        fields: Map<String, Value>,
        auth_context: &str,
    ) -> AppResult<Value> {
        let request = self
            .http
            .post(format!("{}/{table}", self.base_url))
            .json(&fields);
        let response = self
            .scoped(request, auth_context)
            .send()
            .await
            .map_err(|e| Self::send_error(&e))?;
        Self::into_json(response, table).await
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
        auth_context: &str,
    ) -> AppResult<Value> {
        let request = self
            .http
            .patch(format!("{}/{table}/{id}", self.base_url))
            .json(&fields);
        let response = self
            .scoped(request, auth_context)
            .send()
            .await
            .map_err(|e| Self::send_error(&e))?;
        Self::into_json(response, table).await
    }
}
