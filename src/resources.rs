// ABOUTME: Shared server resources built once at startup and handed to every route
// ABOUTME: Builder lets tests swap collaborators and backends for deterministic fakes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::agent::{ResponseCache, VoiceAgent};
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::external::{
    AnalyticsSink, AuthProvider, CrmAnalyticsSink, CrmDataSource, HttpAuthProvider, HttpCrmClient,
    SpeechClient,
};
use crate::llm::{LlmProvider, OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use crate::rate_limiting::RateLimiter;
use crate::session::SessionStore;
use crate::tools::ToolDispatcher;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything request handlers need, shared behind an `Arc`
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Turn orchestration
    pub agent: VoiceAgent,
    /// Conversation store
    pub sessions: SessionStore,
    /// Request budget enforcement
    pub rate_limiter: RateLimiter,
    /// Session resolution
    pub auth: Arc<dyn AuthProvider>,
    /// Audio endpoints
    pub speech: Arc<SpeechClient>,
    /// Backing cache for sessions and answers
    pub cache: Cache,
}

impl ServerResources {
    /// Build production resources: HTTP collaborators, configured cache and limiter
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be created
    pub async fn from_config(config: ServerConfig) -> AppResult<Self> {
        let cache = Cache::new(config.cache.clone()).await;
        let rate_limiter = RateLimiter::from_config(&config.cache, &config.rate_limit).await;

        let provider: Option<Arc<dyn LlmProvider>> =
            match OpenAiCompatibleConfig::from_llm_config(&config.llm) {
                Some(llm) => Some(Arc::new(OpenAiCompatibleProvider::new(llm)?)),
                None => {
                    warn!("No language model API key configured; chat requests will fail with 500");
                    None
                }
            };

        let crm: Arc<dyn CrmDataSource> = Arc::new(HttpCrmClient::new(
            config.collaborators.crm_api_url.clone(),
            config.collaborators.crm_service_key.clone(),
        )?);
        let auth: Arc<dyn AuthProvider> =
            Arc::new(HttpAuthProvider::new(&config.collaborators.auth_api_url)?);

        info!(
            cache = cache.backend_name(),
            rate_limiter = rate_limiter.backend_name(),
            "Server resources initialized"
        );

        ServerResourcesBuilder::new(config)
            .with_cache(cache)
            .with_rate_limiter(rate_limiter)
            .with_llm_provider(provider)
            .with_crm(crm)
            .with_auth(auth)
            .build()
    }
}

/// Assembles [`ServerResources`] from parts
pub struct ServerResourcesBuilder {
    config: ServerConfig,
    cache: Option<Cache>,
    rate_limiter: Option<RateLimiter>,
    llm_provider: Option<Arc<dyn LlmProvider>>,
    crm: Option<Arc<dyn CrmDataSource>>,
    auth: Option<Arc<dyn AuthProvider>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    speech: Option<SpeechClient>,
}

impl ServerResourcesBuilder {
    /// Start from configuration
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            cache: None,
            rate_limiter: None,
            llm_provider: None,
            crm: None,
            auth: None,
            analytics: None,
            speech: None,
        }
    }

    /// Cache backend; defaults to an in-memory cache without a sweep task
    #[must_use]
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Rate limiter; defaults to the in-memory backend
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Model provider; `None` makes chat requests fail with a configuration error
    #[must_use]
    pub fn with_llm_provider(mut self, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        self.llm_provider = provider;
        self
    }

    /// CRM data source (required)
    #[must_use]
    pub fn with_crm(mut self, crm: Arc<dyn CrmDataSource>) -> Self {
        self.crm = Some(crm);
        self
    }

    /// Auth provider (required)
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Analytics sink; defaults to the CRM-backed sink
    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Speech client; defaults to one built from the speech configuration
    #[must_use]
    pub fn with_speech(mut self, speech: SpeechClient) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Build the resources
    ///
    /// # Errors
    ///
    /// Returns an error if a required collaborator is missing or the default
    /// speech client cannot be created
    pub fn build(self) -> AppResult<ServerResources> {
        let crm = self
            .crm
            .ok_or_else(|| AppError::config("CRM data source is required"))?;
        let auth = self
            .auth
            .ok_or_else(|| AppError::config("Auth provider is required"))?;
        let cache = self
            .cache
            .unwrap_or_else(|| Cache::in_memory(self.config.cache.max_entries));
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| RateLimiter::in_memory(&self.config.rate_limit));
        let analytics = self
            .analytics
            .unwrap_or_else(|| Arc::new(CrmAnalyticsSink::new(crm.clone())));
        let speech = match self.speech {
            Some(speech) => speech,
            None => SpeechClient::new(self.config.speech.clone())?,
        };

        let sessions = SessionStore::new(cache.clone(), &self.config.session);
        let response_cache = ResponseCache::new(cache.clone(), &self.config.response_cache);
        let agent = VoiceAgent::new(
            self.llm_provider,
            self.config.llm.clone(),
            sessions.clone(),
            ToolDispatcher::new(crm),
            analytics,
            response_cache,
        );

        Ok(ServerResources {
            config: Arc::new(self.config),
            agent,
            sessions,
            rate_limiter,
            auth,
            speech: Arc::new(speech),
            cache,
        })
    }
}
