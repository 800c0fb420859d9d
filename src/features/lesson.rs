//! Lesson generation: cached per `(topic, level)`, retried at the caller
//! level, and never replaced by fallback content.

use std::sync::{Arc, Mutex};

use tracing::{info, instrument};

use super::state::{FeatureState, StateSlot, Ticket};
use super::{generate_validated, lock_slot, Delivery};
use crate::backend::GenerationRequest;
use crate::cache::Fingerprint;
use crate::catalog::ProficiencyLevel;
use crate::error::{FlowError, Result};
use crate::events::Event;
use crate::prompt::{render, PromptVars};
use crate::schema::LessonContent;
use crate::session::Session;

const FEATURE: &str = "lesson";

/// Build the lesson request for `topic` at `level`.
pub fn lesson_request(session: &Session, topic: &str, level: ProficiencyLevel) -> GenerationRequest {
    let prompts = session.prompts();
    let vars = PromptVars::new()
        .insert("topic", topic)
        .insert("level", level.as_str());
    GenerationRequest::json(render(&prompts.lesson_template, &vars))
        .with_system(prompts.lesson_system.clone())
}

/// Produce a lesson, from the cache when possible.
///
/// A cache hit makes no request. Otherwise the generate-and-parse round is
/// tried `1 + lesson_retries` times; a validated lesson is cached under
/// `(topic, level)`. Exhaustion is [`FlowError::Exhausted`].
#[instrument(skip(session), fields(feature = FEATURE))]
pub async fn generate_lesson(
    session: &Session,
    topic: &str,
    level: ProficiencyLevel,
) -> Result<Delivery<LessonContent>> {
    let key = Fingerprint::lesson(topic, level);
    session.emit(Event::FeatureStart { feature: FEATURE });

    if let Some(lesson) = session.cache().get_lesson(&key) {
        info!(key = %key, "lesson served from cache");
        session.emit(Event::CacheHit {
            feature: FEATURE,
            key: key.to_string(),
        });
        session.emit(Event::FeatureEnd { feature: FEATURE, ok: true });
        return Ok(Delivery::cached(lesson));
    }

    let request = lesson_request(session, topic, level);
    let outcome =
        generate_validated::<LessonContent>(session, FEATURE, &request, session.lesson_retries())
            .await;

    session.emit(Event::FeatureEnd {
        feature: FEATURE,
        ok: outcome.is_ok(),
    });
    let lesson = outcome?;
    info!(key = %key, title = %lesson.title, "lesson generated");
    session.cache().put(key, lesson.clone());
    Ok(Delivery::network(lesson))
}

/// Lesson screen state.
///
/// A failed load stays `Failed` until [`retry`](Self::retry) is called.
pub struct LessonController {
    session: Arc<Session>,
    slot: Mutex<StateSlot<LessonContent>>,
    request: Mutex<Option<(String, ProficiencyLevel)>>,
}

impl LessonController {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            slot: Mutex::new(StateSlot::new()),
            request: Mutex::new(None),
        }
    }

    pub fn state(&self) -> FeatureState<LessonContent> {
        lock_slot(&self.slot).state().clone()
    }

    /// Open a lesson. Returns the state after this call settles, which may
    /// belong to a newer load if this one was superseded.
    pub async fn load(
        &self,
        topic: &str,
        level: ProficiencyLevel,
    ) -> Result<FeatureState<LessonContent>> {
        self.remember(topic, level);
        let key = Fingerprint::lesson(topic, level);
        if let Some(lesson) = self.session.cache().get_lesson(&key) {
            lock_slot(&self.slot).resolve_cached(lesson)?;
            return Ok(self.state());
        }
        let ticket = lock_slot(&self.slot).begin()?;
        self.run(ticket, topic, level).await
    }

    /// Reload the last requested lesson after a failure.
    pub async fn retry(&self) -> Result<FeatureState<LessonContent>> {
        let (topic, level) = self
            .request
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(FlowError::InvalidTransition {
                from: "idle",
                action: "retry",
            })?;
        let ticket = lock_slot(&self.slot).retry()?;
        self.run(ticket, &topic, level).await
    }

    /// The screen was closed; late results are dropped.
    pub fn teardown(&self) {
        lock_slot(&self.slot).teardown();
    }

    fn remember(&self, topic: &str, level: ProficiencyLevel) {
        *self.request.lock().unwrap_or_else(|p| p.into_inner()) = Some((topic.to_string(), level));
    }

    async fn run(
        &self,
        ticket: Ticket,
        topic: &str,
        level: ProficiencyLevel,
    ) -> Result<FeatureState<LessonContent>> {
        let outcome = generate_lesson(&self.session, topic, level)
            .await
            .map(Delivery::into_value);
        lock_slot(&self.slot).settle(ticket, outcome);
        Ok(self.state())
    }
}
