//! Mock backend for testing without a live model.
//!
//! [`MockBackend`] plays back a script of replies in order, cycling back to
//! the start when the script runs out. Scripts can mix text, HTTP failures,
//! transport errors and slow replies, which is enough to drive every retry
//! and timeout path deterministically.
//!
//! # Example
//!
//! ```
//! use grammarflow::backend::MockBackend;
//! use grammarflow::backend::mock::MockReply;
//!
//! let mock = MockBackend::fixed("Hello, world!");
//! let flaky = MockBackend::scripted(vec![MockReply::Status(503), MockReply::Text("ok".into())]);
//! assert_eq!(flaky.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, GenerationRequest, TransportReply};
use crate::error::{FlowError, Result};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// 200 with this text (may be empty).
    Text(String),
    /// Non-success HTTP status.
    Status(u16),
    /// Transport-level failure with this message.
    Fail(String),
    /// 200 with this text after sleeping (uses tokio time, so it honours paused clocks).
    Delayed(Duration, String),
}

/// A test backend that returns scripted replies in order.
#[derive(Debug)]
pub struct MockBackend {
    script: Vec<MockReply>,
    index: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockBackend {
    /// Create a mock returning the given texts in order.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Text).collect())
    }

    /// Create a mock that always returns the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock from an arbitrary script. An empty script behaves like
    /// a single empty [`MockReply::Text`].
    pub fn scripted(mut script: Vec<MockReply>) -> Self {
        if script.is_empty() {
            script.push(MockReply::Text(String::new()));
        }
        Self {
            script,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::SeqCst) % self.script.len();
        self.script[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &GenerationRequest,
    ) -> Result<TransportReply> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        match self.next_reply() {
            MockReply::Text(text) => Ok(TransportReply { text, status: 200 }),
            MockReply::Status(status) => Err(FlowError::HttpError {
                status,
                body: "mock failure".into(),
            }),
            MockReply::Fail(msg) => Err(FlowError::Other(msg)),
            MockReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(TransportReply { text, status: 200 })
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
