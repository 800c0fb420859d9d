//! Backend trait, generation client, and retry orchestrator.
//!
//! The [`Backend`] trait abstracts over how a prompt reaches the model:
//! through a first-party relay that hides credentials, or straight to the
//! provider with an embedded key. Everything above this module sees one
//! interface and never a transport error.
//!
//! ## Architecture
//!
//! ```text
//! feature caller ──► request_with_retry() ──► generate() ──► Backend::complete()
//!                        │  (bounded loop,        │  (timeout,        │
//!                        │   linear backoff)      │   classification) ┌┴──────────────┐
//!                        ▼                        ▼              RelayBackend   GeminiBackend
//!                   String (maybe empty)   GenerationOutcome     /api/generate  :generateContent
//! ```

pub mod backoff;
pub mod gemini;
pub mod mock;
pub mod relay;

pub use backoff::{BackoffConfig, ExhaustionPolicy};
pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use relay::RelayBackend;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{FlowError, Result};

/// Callback invoked before each transport retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &str) + Send)>;

/// A provider-agnostic generation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The task prompt.
    pub prompt: String,
    /// Instructional context; empty means none.
    pub system_instruction: String,
    /// Ask the provider for JSON-shaped output.
    pub json_mode: bool,
}

impl GenerationRequest {
    /// A free-text request (chat replies).
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: String::new(),
            json_mode: false,
        }
    }

    /// A request whose reply must be a JSON object.
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            json_mode: true,
            ..Self::text(prompt)
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }
}

/// What a backend returns for one successful HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    /// Generated text; empty when the provider returned nothing usable.
    pub text: String,
    /// HTTP status code (for logging).
    pub status: u16,
}

/// How to reach the model.
///
/// Implementors translate a [`GenerationRequest`] into one HTTP exchange.
/// Built-in: [`RelayBackend`], [`GeminiBackend`], [`MockBackend`].
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Perform one request. Non-2xx statuses must be reported as
    /// [`FlowError::HttpError`].
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &GenerationRequest,
    ) -> Result<TransportReply>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Why a single attempt did not produce text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Timeout(Duration),
    Status(u16),
    Transport(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout(d) => write!(f, "timed out after {:?}", d),
            FailureReason::Status(s) => write!(f, "server status {}", s),
            FailureReason::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Classified result of one generation attempt.
///
/// A non-blank reply is always `Success` here; whether the text is usable is
/// for the parser to decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success(String),
    Empty,
    TransientFailure(FailureReason),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    fn from_error(err: FlowError) -> Self {
        let reason = match err {
            FlowError::HttpError { status, .. } => FailureReason::Status(status),
            FlowError::Timeout(d) => FailureReason::Timeout(d),
            other => FailureReason::Transport(other.to_string()),
        };
        GenerationOutcome::TransientFailure(reason)
    }
}

/// Issue one request with a hard timeout and classify the result.
///
/// Never fails: transport, status, serialization and timeout errors all come
/// back as [`GenerationOutcome::TransientFailure`].
pub async fn generate(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &GenerationRequest,
    timeout: Duration,
) -> GenerationOutcome {
    let call = backend.complete(client, base_url, request);
    match tokio::time::timeout(timeout, call).await {
        Err(_elapsed) => GenerationOutcome::TransientFailure(FailureReason::Timeout(timeout)),
        Ok(Err(e)) => GenerationOutcome::from_error(e),
        Ok(Ok(reply)) if reply.text.trim().is_empty() => GenerationOutcome::Empty,
        Ok(Ok(reply)) => GenerationOutcome::Success(reply.text),
    }
}

/// Call [`generate`] until it succeeds or the retry budget runs out.
///
/// `Empty` and `TransientFailure` outcomes are both retried. The delay before
/// retry `n` is [`BackoffConfig::delay_for_attempt`]`(n)`. On exhaustion the
/// configured [`ExhaustionPolicy`] text is returned; this function never
/// fails.
///
/// # Arguments
///
/// * `backend` — Transport to use
/// * `client` — HTTP client for making requests
/// * `base_url` — Base URL of the relay or provider
/// * `request` — The generation request
/// * `timeout` — Per-attempt timeout
/// * `config` — Retry policy
/// * `on_retry` — Optional callback invoked before each retry with (attempt, delay, reason)
pub async fn request_with_retry(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &GenerationRequest,
    timeout: Duration,
    config: &BackoffConfig,
    mut on_retry: RetryCallback<'_>,
) -> String {
    let mut last_reason = String::new();

    for attempt in 0..config.max_attempts() {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            if let Some(ref mut cb) = on_retry {
                cb(attempt, delay, &last_reason);
            }
            tokio::time::sleep(delay).await;
        }

        debug!(
            backend = backend.name(),
            attempt = attempt + 1,
            prompt_len = request.prompt.len(),
            json_mode = request.json_mode,
            "generation attempt"
        );

        match generate(backend, client, base_url, request, timeout).await {
            GenerationOutcome::Success(text) => return text,
            GenerationOutcome::Empty => {
                warn!(backend = backend.name(), attempt = attempt + 1, "empty model output");
                last_reason = "empty model output".to_string();
            }
            GenerationOutcome::TransientFailure(reason) => {
                warn!(backend = backend.name(), attempt = attempt + 1, %reason, "attempt failed");
                last_reason = reason.to_string();
            }
        }
    }

    warn!(
        backend = backend.name(),
        attempts = config.max_attempts(),
        last_reason = %last_reason,
        "generation retries exhausted"
    );
    config.exhaustion.exhaustion_text()
}
