//! Writing lab: grammar feedback on a learner's sentence.

use std::sync::{Arc, Mutex};

use tracing::{instrument, warn};

use super::state::{FeatureState, StateSlot};
use super::{generate_validated, lock_slot, Delivery};
use crate::backend::GenerationRequest;
use crate::catalog::ProficiencyLevel;
use crate::error::Result;
use crate::events::Event;
use crate::prompt::{render, PromptVars};
use crate::schema::AnalysisResult;
use crate::session::Session;

const FEATURE: &str = "writing";

/// Shown when no analysis could be produced.
pub fn fallback_analysis() -> AnalysisResult {
    AnalysisResult {
        corrected: "Lỗi kết nối".into(),
        is_correct: false,
        analysis: "Vui lòng kiểm tra lại server backend.".into(),
        better_way: None,
    }
}

pub fn writing_request(session: &Session, text: &str, level: ProficiencyLevel) -> GenerationRequest {
    let prompts = session.prompts();
    let vars = PromptVars::new()
        .insert("text", text)
        .insert("level", level.as_str());
    GenerationRequest::json(render(&prompts.writing_template, &vars))
        .with_system(prompts.writing_system.clone())
}

/// Analyze `text`. Blank text makes no request and yields `None`.
///
/// One generate-and-parse round, never cached; failure delivers
/// [`fallback_analysis`].
#[instrument(skip(session, text), fields(feature = FEATURE, text_len = text.len()))]
pub async fn analyze_writing(
    session: &Session,
    text: &str,
    level: ProficiencyLevel,
) -> Option<Delivery<AnalysisResult>> {
    if text.trim().is_empty() {
        return None;
    }
    session.emit(Event::FeatureStart { feature: FEATURE });
    let request = writing_request(session, text, level);
    let delivery = match generate_validated::<AnalysisResult>(session, FEATURE, &request, 0).await
    {
        Ok(analysis) => Delivery::network(analysis),
        Err(e) => {
            warn!(error = %e, "serving fallback analysis");
            session.emit(Event::FallbackUsed { feature: FEATURE });
            Delivery::fallback(fallback_analysis())
        }
    };
    session.emit(Event::FeatureEnd {
        feature: FEATURE,
        ok: !delivery.is_fallback(),
    });
    Some(delivery)
}

/// Writing lab state. Each submission replaces the previous analysis.
pub struct WritingLab {
    session: Arc<Session>,
    level: ProficiencyLevel,
    slot: Mutex<StateSlot<Delivery<AnalysisResult>>>,
}

impl WritingLab {
    pub fn new(session: Arc<Session>, level: ProficiencyLevel) -> Self {
        Self {
            session,
            level,
            slot: Mutex::new(StateSlot::new()),
        }
    }

    pub fn state(&self) -> FeatureState<Delivery<AnalysisResult>> {
        lock_slot(&self.slot).state().clone()
    }

    /// Submit `text`. Blank text leaves the state untouched and returns
    /// `Ok(false)`; otherwise returns whether the result was applied.
    pub async fn submit(&self, text: &str) -> Result<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }
        let ticket = lock_slot(&self.slot).begin()?;
        match analyze_writing(&self.session, text, self.level).await {
            Some(delivery) => Ok(lock_slot(&self.slot).settle(ticket, Ok(delivery))),
            None => Ok(false),
        }
    }

    pub fn close(&self) {
        lock_slot(&self.slot).teardown();
    }
}
