//! Daily challenge: one multiple-choice question per level, cached for the
//! session, with a static question when generation fails.

use std::sync::{Arc, Mutex};

use tracing::{info, instrument, warn};

use super::state::{FeatureState, StateSlot};
use super::{generate_validated, lock_slot, Delivery};
use crate::backend::GenerationRequest;
use crate::cache::Fingerprint;
use crate::catalog::ProficiencyLevel;
use crate::error::Result;
use crate::events::Event;
use crate::prompt::{render, PromptVars};
use crate::schema::QuizData;
use crate::session::Session;

const FEATURE: &str = "daily";

/// The question shown when no challenge could be generated.
pub fn fallback_quiz() -> QuizData {
    QuizData {
        question: "I _____ to music every day.".into(),
        options: vec![
            "listen".into(),
            "listening".into(),
            "listens".into(),
            "listened".into(),
        ],
        correct: 0,
        explanation: "Present Simple dùng cho thói quen hàng ngày.".into(),
    }
}

pub fn daily_request(session: &Session, level: ProficiencyLevel) -> GenerationRequest {
    let prompts = session.prompts();
    let vars = PromptVars::new().insert("level", level.as_str());
    GenerationRequest::json(render(&prompts.daily_template, &vars))
        .with_system(prompts.daily_system.clone())
}

/// Produce today's challenge for `level`. Never fails.
///
/// Generated questions are cached per level. When every round fails the
/// [`fallback_quiz`] is delivered with [`Origin::Fallback`](super::Origin)
/// and is not cached, so the next call tries the network again.
#[instrument(skip(session), fields(feature = FEATURE))]
pub async fn generate_daily_challenge(
    session: &Session,
    level: ProficiencyLevel,
) -> Delivery<QuizData> {
    let key = Fingerprint::daily(level);
    session.emit(Event::FeatureStart { feature: FEATURE });

    if let Some(quiz) = session.cache().get_quiz(&key) {
        info!(key = %key, "daily challenge served from cache");
        session.emit(Event::CacheHit {
            feature: FEATURE,
            key: key.to_string(),
        });
        session.emit(Event::FeatureEnd { feature: FEATURE, ok: true });
        return Delivery::cached(quiz);
    }

    let request = daily_request(session, level);
    let delivery =
        match generate_validated::<QuizData>(session, FEATURE, &request, session.daily_retries())
            .await
        {
            Ok(quiz) => {
                session.cache().put(key, quiz.clone());
                Delivery::network(quiz)
            }
            Err(e) => {
                warn!(error = %e, "serving fallback daily challenge");
                session.emit(Event::FallbackUsed { feature: FEATURE });
                Delivery::fallback(fallback_quiz())
            }
        };
    session.emit(Event::FeatureEnd {
        feature: FEATURE,
        ok: !delivery.is_fallback(),
    });
    delivery
}

/// Daily challenge modal state.
///
/// Loads settle to `Success` with either a generated or the fallback
/// question. Closing the modal mid-fetch (or reopening it before the
/// previous fetch returns) leaves the late result unapplied.
pub struct DailyChallengeController {
    session: Arc<Session>,
    slot: Mutex<StateSlot<Delivery<QuizData>>>,
}

impl DailyChallengeController {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            slot: Mutex::new(StateSlot::new()),
        }
    }

    pub fn state(&self) -> FeatureState<Delivery<QuizData>> {
        lock_slot(&self.slot).state().clone()
    }

    /// Open the modal for `level`. Returns whether this load's result was
    /// applied.
    pub async fn open(&self, level: ProficiencyLevel) -> Result<bool> {
        if let Some(quiz) = self.session.cache().get_quiz(&Fingerprint::daily(level)) {
            lock_slot(&self.slot).resolve_cached(Delivery::cached(quiz))?;
            return Ok(true);
        }
        let ticket = lock_slot(&self.slot).begin()?;
        let delivery = generate_daily_challenge(&self.session, level).await;
        Ok(lock_slot(&self.slot).settle(ticket, Ok(delivery)))
    }

    /// Check an answer against the current question. `None` until loaded.
    pub fn answer(&self, choice: usize) -> Option<bool> {
        lock_slot(&self.slot)
            .state()
            .value()
            .map(|d| d.value.is_correct(choice))
    }

    pub fn close(&self) {
        lock_slot(&self.slot).teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockReply;
    use crate::backend::{BackoffConfig, MockBackend};
    use crate::features::Origin;
    use std::time::Duration;

    const QUIZ: &str = r#"```json
{"question":"She ___ tea.","options":["drink","drinks"],"correct":1,"explanation":"Ngôi thứ ba số ít."}
```"#;

    fn session_with(mock: Arc<MockBackend>) -> Arc<Session> {
        Arc::new(
            Session::builder("http://unused")
                .backend(mock)
                .backoff(BackoffConfig::none())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn fallback_is_valid() {
        let quiz = fallback_quiz();
        assert!(crate::schema::Shape::validate(&quiz).is_ok());
        assert!(quiz.is_correct(0));
    }

    #[tokio::test]
    async fn generated_challenge_is_cached_per_level() {
        let mock = Arc::new(MockBackend::fixed(QUIZ));
        let session = session_with(mock.clone());

        let d = generate_daily_challenge(&session, ProficiencyLevel::Beginner).await;
        assert_eq!(d.origin, Origin::Network);
        assert_eq!(d.value.correct, 1);
        let again = generate_daily_challenge(&session, ProficiencyLevel::Beginner).await;
        assert_eq!(again.origin, Origin::Cache);
        assert_eq!(mock.calls(), 1);

        generate_daily_challenge(&session, ProficiencyLevel::Advanced).await;
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_after_three_rounds_is_not_cached() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Fail("offline".into())]));
        let session = session_with(mock.clone());

        let d = generate_daily_challenge(&session, ProficiencyLevel::Intermediate).await;
        assert!(d.is_fallback());
        assert_eq!(d.value, fallback_quiz());
        assert_eq!(mock.calls(), 3);
        assert!(session.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn controller_settles_fallback_as_success() {
        let mock = Arc::new(MockBackend::fixed("{}"));
        let controller = DailyChallengeController::new(session_with(mock));
        assert!(controller.open(ProficiencyLevel::Beginner).await.unwrap());
        match controller.state() {
            FeatureState::Success(d) => assert!(d.is_fallback()),
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(controller.answer(0), Some(true));
        assert_eq!(controller.answer(2), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn close_mid_fetch_discards_result() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Delayed(
            Duration::from_secs(5),
            QUIZ.into(),
        )]));
        let controller = DailyChallengeController::new(session_with(mock));

        let (applied, _) = tokio::join!(controller.open(ProficiencyLevel::Beginner), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            controller.close();
        });
        assert!(!applied.unwrap());
        assert!(controller.state().is_loading());
        assert_eq!(controller.answer(0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_open_does_not_overwrite_newer_result() {
        let mock = Arc::new(MockBackend::scripted(vec![
            MockReply::Delayed(Duration::from_secs(10), "{}".into()),
            MockReply::Text(QUIZ.into()),
        ]));
        let session = session_with(mock);
        let controller = DailyChallengeController::new(session);

        let (first, second) = tokio::join!(
            controller.open(ProficiencyLevel::Advanced),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                controller.open(ProficiencyLevel::Beginner).await
            }
        );
        assert!(!first.unwrap());
        assert!(second.unwrap());
        match controller.state() {
            FeatureState::Success(d) => assert_eq!(d.value.question, "She ___ tea."),
            other => panic!("unexpected state {:?}", other),
        }
    }
}
