//! Event hooks for feature lifecycle and retries.
//!
//! Presentation code can observe what the pipeline is doing (to show a
//! spinner, a "waking up the server" hint, or a retry counter) by installing
//! an [`EventHandler`] on the [`Session`](crate::Session). Entirely optional.

use std::sync::Arc;

/// Events emitted while a feature request runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A feature pipeline has started.
    FeatureStart {
        /// Feature name (`"lesson"`, `"daily"`, `"chat"`, `"writing"`).
        feature: &'static str,
    },
    /// A cacheable request was answered from the session cache.
    CacheHit {
        feature: &'static str,
        /// Display form of the fingerprint.
        key: String,
    },
    /// A transport-level retry is about to sleep.
    TransportRetry {
        feature: &'static str,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        /// Reason for the retry (error description).
        reason: String,
    },
    /// The whole generate-and-parse round trip is being repeated.
    CallerRetry {
        feature: &'static str,
        /// The caller-level attempt about to start (1-indexed retry number).
        attempt: u32,
        /// Why the previous round failed.
        reason: String,
    },
    /// A static fallback payload was served instead of generated content.
    FallbackUsed { feature: &'static str },
    /// A feature pipeline has finished.
    FeatureEnd {
        feature: &'static str,
        /// Whether generated (or cached) content was delivered.
        ok: bool,
    },
}

/// Handler for pipeline events.
///
/// # Example
///
/// ```
/// use grammarflow::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::FeatureStart { feature } => println!("[start] {}", feature),
///             Event::FeatureEnd { feature, ok } => println!("[end] {} ok={}", feature, ok),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use grammarflow::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::TransportRetry { attempt, .. } = event {
///         eprintln!("retry #{}", attempt);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
