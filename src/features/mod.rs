//! Feature callers: lesson, daily challenge, chat turn, writing analysis.
//!
//! Each feature exposes a free async pipeline function taking `&Session`
//! (cache check, prompt, retry orchestrator, parse, validate, cache store or
//! fallback) and a controller that drives a [`StateSlot`] for presentation
//! code.

pub mod chat;
pub mod daily;
pub mod lesson;
pub mod state;
pub mod writing;

pub use chat::{ChatMessage, ChatRole, ChatSession};
pub use daily::{fallback_quiz, DailyChallengeController};
pub use lesson::LessonController;
pub use state::{FeatureState, StateSlot, Ticket};
pub use writing::{fallback_analysis, WritingLab};

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::backend::GenerationRequest;
use crate::error::{FlowError, Result};
use crate::events::Event;
use crate::schema::{parse_shape, Shape};
use crate::session::Session;

/// Where a delivered value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Generated and validated during this call.
    Network,
    /// Served from the session cache; no request was made.
    Cache,
    /// A static stand-in after generation failed.
    Fallback,
}

/// A feature result tagged with its [`Origin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> Delivery<T> {
    pub fn network(value: T) -> Self {
        Self { value, origin: Origin::Network }
    }

    pub fn cached(value: T) -> Self {
        Self { value, origin: Origin::Cache }
    }

    pub fn fallback(value: T) -> Self {
        Self { value, origin: Origin::Fallback }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == Origin::Fallback
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Generate and validate `T`, repeating the whole round trip up to
/// `retries` extra times with the session's caller retry delay in between.
///
/// A round fails when the retry orchestrator comes back exhausted or when
/// its text does not parse as `T`. Rounds compound with transport retries.
pub(crate) async fn generate_validated<T: Shape>(
    session: &Session,
    feature: &'static str,
    request: &GenerationRequest,
    retries: u32,
) -> Result<T> {
    let rounds = retries + 1;
    let mut last_error = String::new();

    for round in 0..rounds {
        if round > 0 {
            session.emit(Event::CallerRetry {
                feature,
                attempt: round,
                reason: last_error.clone(),
            });
            tokio::time::sleep(session.caller_retry_delay()).await;
        }

        let text = session.request_with_retry(feature, request).await;
        if session.backoff().exhaustion.is_exhaustion(&text) {
            warn!(feature, round = round + 1, "transport retries exhausted");
            last_error = FlowError::EmptyOutput.to_string();
            continue;
        }

        match parse_shape::<T>(&text) {
            Ok(record) => {
                debug!(feature, round = round + 1, shape = T::NAME, "validated model output");
                return Ok(record);
            }
            Err(e) => {
                warn!(feature, round = round + 1, error = %e, "unusable model output");
                last_error = e.to_string();
            }
        }
    }

    Err(FlowError::Exhausted {
        feature,
        attempts: rounds,
        last_error,
    })
}

pub(crate) fn lock_slot<T>(slot: &Mutex<StateSlot<T>>) -> MutexGuard<'_, StateSlot<T>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
