// ABOUTME: Per-request context read from inbound headers
// ABOUTME: Resolves the client IP, the caller's credentials and a correlation id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::external::RequestCredentials;
use http::header::{AUTHORIZATION, COOKIE};
use http::HeaderMap;
use tracing::Span;
use uuid::Uuid;

/// Placeholder when no proxy header names the client
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Context that flows through one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation id (`x-request-id` or generated)
    pub request_id: String,
    /// Client IP used for rate-limit identifiers
    pub client_ip: String,
    /// Credentials forwarded to the auth service
    pub credentials: RequestCredentials,
}

impl RequestContext {
    /// Read the context from request headers and record it on the current span
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = header_str(headers, "x-request-id")
            .map_or_else(|| format!("req_{}", Uuid::new_v4().simple()), ToOwned::to_owned);
        let context = Self {
            request_id,
            client_ip: client_ip(headers),
            credentials: request_credentials(headers),
        };
        Span::current().record("request_id", context.request_id.as_str());
        context
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, else `unknown`
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_owned();
    }
    header_str(headers, "x-real-ip").map_or_else(|| UNKNOWN_CLIENT_IP.to_owned(), ToOwned::to_owned)
}

/// Session cookie and bearer token, if present
#[must_use]
pub fn request_credentials(headers: &HeaderMap) -> RequestCredentials {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned);
    let cookie = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToOwned::to_owned);
    RequestCredentials { cookie, bearer }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn forwarded_for_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "203.0.113.7");

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers), "10.0.0.2");

        assert_eq!(client_ip(&HeaderMap::new()), UNKNOWN_CLIENT_IP);
    }

    #[test]
    fn credentials_read_bearer_and_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.insert(COOKIE, HeaderValue::from_static("sid=xyz"));
        let creds = request_credentials(&headers);
        assert_eq!(creds.bearer.as_deref(), Some("abc123"));
        assert_eq!(creds.cookie.as_deref(), Some("sid=xyz"));

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert!(request_credentials(&basic).is_empty());
    }
}
