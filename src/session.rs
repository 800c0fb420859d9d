//! Session context shared by every feature caller.
//!
//! [`Session`] carries the HTTP client, backend, retry policy, timeout,
//! prompt templates, the response cache and an optional event handler. Build
//! it once per running application and share it (`Arc<Session>`) between
//! feature controllers; the cache lives and dies with it.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::backend::{
    self, Backend, BackoffConfig, GeminiBackend, GenerationOutcome, GenerationRequest,
    RelayBackend,
};
use crate::cache::ResponseCache;
use crate::config::{FlowConfig, Prompts, Transport};
use crate::error::{FlowError, Result};
use crate::events::{self, Event, EventHandler};

/// Per-application generation context.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use grammarflow::{MockBackend, Session};
///
/// let session = Session::builder("http://localhost:3000")
///     .backend(Arc::new(MockBackend::fixed("{}")))
///     .build()
///     .unwrap();
/// assert!(session.cache().is_empty());
/// ```
pub struct Session {
    client: Client,
    base_url: String,
    backend: Arc<dyn Backend>,
    backoff: BackoffConfig,
    timeout: Duration,
    prompts: Prompts,
    lesson_retries: u32,
    daily_retries: u32,
    caller_retry_delay: Duration,
    cache: ResponseCache,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Session {
    pub fn builder(base_url: impl Into<String>) -> SessionBuilder {
        SessionBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            backoff: None,
            timeout: None,
            prompts: None,
            lesson_retries: 2,
            daily_retries: 2,
            caller_retry_delay: Duration::from_millis(1000),
            event_handler: None,
        }
    }

    /// Build a session from validated configuration.
    ///
    /// Relay transport gets [`BackoffConfig::relay()`]; direct transport gets
    /// [`BackoffConfig::direct()`] and a [`GeminiBackend`] holding the key.
    pub fn from_config(config: &FlowConfig) -> Result<Self> {
        config.validate()?;

        let (backend, backoff): (Arc<dyn Backend>, BackoffConfig) = match config.transport {
            Transport::Relay => (Arc::new(RelayBackend::new()), BackoffConfig::relay()),
            Transport::Direct => {
                let key = config.api_key.clone().ok_or_else(|| {
                    FlowError::InvalidConfig("direct transport requires api_key".into())
                })?;
                (
                    Arc::new(GeminiBackend::new(key).with_model(config.model.clone())),
                    BackoffConfig::direct(),
                )
            }
        };
        let mut backoff = backoff.with_max_retries(config.max_retries);
        if let Some(ms) = config.base_delay_ms {
            backoff = backoff.with_base_delay(Duration::from_millis(ms));
        }

        Self::builder(config.resolved_base_url())
            .backend(backend)
            .backoff(backoff)
            .timeout(config.timeout())
            .prompts(config.prompts.clone())
            .lesson_retries(config.lesson_retries)
            .daily_retries(config.daily_retries)
            .caller_retry_delay(config.caller_retry_delay())
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn lesson_retries(&self) -> u32 {
        self.lesson_retries
    }

    pub fn daily_retries(&self) -> u32 {
        self.daily_retries
    }

    pub fn caller_retry_delay(&self) -> Duration {
        self.caller_retry_delay
    }

    /// One attempt, classified. See [`backend::generate`].
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        backend::generate(
            &self.backend,
            &self.client,
            &self.base_url,
            request,
            self.timeout,
        )
        .await
    }

    /// Run the retry orchestrator for `feature`, reporting each transport
    /// retry as [`Event::TransportRetry`]. Never fails; see
    /// [`backend::request_with_retry`].
    pub async fn request_with_retry(
        &self,
        feature: &'static str,
        request: &GenerationRequest,
    ) -> String {
        let handler = &self.event_handler;
        let mut on_retry = |attempt: u32, delay: Duration, reason: &str| {
            debug!(feature, attempt, delay_ms = delay.as_millis() as u64, "transport retry");
            events::emit(
                handler,
                Event::TransportRetry {
                    feature,
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: reason.to_string(),
                },
            );
        };
        backend::request_with_retry(
            &self.backend,
            &self.client,
            &self.base_url,
            request,
            self.timeout,
            &self.backoff,
            Some(&mut on_retry),
        )
        .await
    }

    pub(crate) fn emit(&self, event: Event) {
        events::emit(&self.event_handler, event);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("backoff", &self.backoff)
            .field("timeout", &self.timeout)
            .field("cached_entries", &self.cache.len())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    backoff: Option<BackoffConfig>,
    timeout: Option<Duration>,
    prompts: Option<Prompts>,
    lesson_retries: u32,
    daily_retries: u32,
    caller_retry_delay: Duration,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl SessionBuilder {
    /// Set the HTTP client. If not set, one is built with the session timeout.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the transport. Default: [`RelayBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the transport retry policy. Default: [`BackoffConfig::relay()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Per-attempt timeout. Default: 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Caller-level retries around a lesson's generate-and-parse round.
    pub fn lesson_retries(mut self, retries: u32) -> Self {
        self.lesson_retries = retries;
        self
    }

    pub fn daily_retries(mut self, retries: u32) -> Self {
        self.daily_retries = retries;
        self
    }

    /// Pause between caller-level rounds. Default: 1 second.
    pub fn caller_retry_delay(mut self, delay: Duration) -> Self {
        self.caller_retry_delay = delay;
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Session> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(60));
        if timeout.is_zero() {
            return Err(FlowError::InvalidConfig("timeout must be positive".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(FlowError::InvalidConfig("base_url is empty".into()));
        }
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().timeout(timeout).build()?,
        };
        Ok(Session {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(RelayBackend::new())),
            backoff: self.backoff.unwrap_or_default(),
            timeout,
            prompts: self.prompts.unwrap_or_default(),
            lesson_retries: self.lesson_retries,
            daily_retries: self.daily_retries,
            caller_retry_delay: self.caller_retry_delay,
            cache: ResponseCache::new(),
            event_handler: self.event_handler,
        })
    }
}

/// Strip endpoint paths a user may have pasted into the base URL, so that
/// backends appending their own path do not double it.
/// e.g. "https://relay.example.com/api/generate" -> "https://relay.example.com"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    for suffix in &["/api/generate", "/api", "/v1beta"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}
