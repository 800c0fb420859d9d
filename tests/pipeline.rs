//! End-to-end scenarios through the public API, driven by `MockBackend`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use grammarflow::backend::mock::MockReply;
use grammarflow::features::chat::FALLBACK_REPLY;
use grammarflow::features::daily::generate_daily_challenge;
use grammarflow::features::lesson::generate_lesson;
use grammarflow::features::writing::analyze_writing;
use grammarflow::features::{fallback_analysis, fallback_quiz};
use grammarflow::schema::parse_shape;
use grammarflow::{
    BackoffConfig, ChatSession, Event, FeatureState, Fingerprint, FlowError, FnEventHandler,
    LessonContent, LessonController, MockBackend, Origin, ProficiencyLevel, QuizData, Session,
};

const FENCED_LESSON: &str = "```json\n{\"title\":\"T\",\"intro\":\"I\",\"theory\":\"Th\",\"examples\":[\"E1\"],\"quiz\":{\"question\":\"Q\",\"options\":[\"A\",\"B\"],\"correct\":1,\"explanation\":\"Exp\"}}\n```";

fn session(mock: &Arc<MockBackend>, backoff: BackoffConfig) -> Arc<Session> {
    Arc::new(
        Session::builder("http://relay.invalid")
            .backend(mock.clone())
            .backoff(backoff)
            .build()
            .expect("session"),
    )
}

#[tokio::test]
async fn passive_voice_lesson_is_parsed_cached_and_reused() {
    let mock = Arc::new(MockBackend::fixed(FENCED_LESSON));
    let session = session(&mock, BackoffConfig::relay());

    let first = generate_lesson(&session, "Passive Voice", ProficiencyLevel::Beginner)
        .await
        .unwrap();
    assert_eq!(first.value.title, "T");
    assert_eq!(first.value.quiz.correct, 1);
    assert_eq!(first.origin, Origin::Network);

    let key = Fingerprint::lesson("Passive Voice", ProficiencyLevel::Beginner);
    assert_eq!(session.cache().get_lesson(&key), Some(first.value.clone()));

    let second = generate_lesson(&session, "Passive Voice", ProficiencyLevel::Beginner)
        .await
        .unwrap();
    assert_eq!(second.value, first.value);
    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(mock.calls(), 1);
}

#[test]
fn fenced_and_bare_output_decode_identically() {
    let bare = FENCED_LESSON
        .trim_start_matches("```json\n")
        .trim_end_matches("\n```");
    let untagged = format!("```\n{}\n```", bare);
    let a: LessonContent = parse_shape(FENCED_LESSON).unwrap();
    let b: LessonContent = parse_shape(bare).unwrap();
    let c: LessonContent = parse_shape(&untagged).unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[test]
fn out_of_range_correct_index_is_a_shape_error() {
    let err = parse_shape::<QuizData>(
        r#"{"question":"Q","options":["a","b"],"correct":5,"explanation":"x"}"#,
    )
    .unwrap_err();
    assert!(err.is_shape());
}

#[tokio::test]
async fn overlapping_lessons_for_different_topics_cache_independently() {
    let mock = Arc::new(MockBackend::fixed(FENCED_LESSON));
    let session = session(&mock, BackoffConfig::relay());

    let (a, b) = futures::join!(
        generate_lesson(&session, "Articles", ProficiencyLevel::Beginner),
        generate_lesson(&session, "Modal Verbs", ProficiencyLevel::Advanced),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(session.cache().len(), 2);
    assert_eq!(mock.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn daily_challenge_falls_back_when_server_is_down() {
    let mock = Arc::new(MockBackend::scripted(vec![MockReply::Status(503)]));
    let session = session(&mock, BackoffConfig::relay());

    let d = generate_daily_challenge(&session, ProficiencyLevel::Beginner).await;
    assert!(d.is_fallback());
    assert_eq!(d.value, fallback_quiz());
    // Three caller rounds of three transport attempts each.
    assert_eq!(mock.calls(), 9);
    assert!(session.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn chat_and_writing_fall_back_on_exhaustion() {
    let mock = Arc::new(MockBackend::scripted(vec![MockReply::Fail("offline".into())]));
    let session = session(&mock, BackoffConfig::direct());

    let chat = ChatSession::new(session.clone(), ProficiencyLevel::Beginner);
    let reply = chat.send("Xin chào").await.unwrap().unwrap();
    assert_eq!(reply.value, FALLBACK_REPLY);

    let analysis = analyze_writing(&session, "He don't like it.", ProficiencyLevel::Beginner)
        .await
        .unwrap();
    assert_eq!(analysis.value, fallback_analysis());
    assert_eq!(mock.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn lesson_controller_discards_stale_result() {
    let mock = Arc::new(MockBackend::scripted(vec![
        MockReply::Delayed(Duration::from_secs(30), FENCED_LESSON.replace("\"T\"", "\"Old\"")),
        MockReply::Text(FENCED_LESSON.into()),
    ]));
    let controller = LessonController::new(session(&mock, BackoffConfig::relay()));

    let (first, second) = tokio::join!(
        controller.load("Articles", ProficiencyLevel::Beginner),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            controller.load("Passive Voice", ProficiencyLevel::Beginner).await
        }
    );
    first.unwrap();
    second.unwrap();
    match controller.state() {
        FeatureState::Success(lesson) => assert_eq!(lesson.title, "T"),
        other => panic!("unexpected state {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn lesson_exhaustion_is_a_retryable_failure() {
    let mock = Arc::new(MockBackend::fixed("Xin lỗi, tôi không thể trả lời."));
    let controller = LessonController::new(session(&mock, BackoffConfig::relay()));

    let state = controller
        .load("Conditionals", ProficiencyLevel::Intermediate)
        .await
        .unwrap();
    assert!(state.error().is_some_and(|e| e.contains("lesson failed after 3 attempt(s)")));
}

#[tokio::test(start_paused = true)]
async fn events_trace_the_retry_layers() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mock = Arc::new(MockBackend::scripted(vec![
        MockReply::Status(500),
        MockReply::Text("not json".into()),
        MockReply::Text("{\"question\":\"Q\",\"options\":[\"a\"],\"correct\":0}".into()),
    ]));
    let session = Session::builder("http://relay.invalid")
        .backend(mock.clone())
        .backoff(BackoffConfig::relay())
        .event_handler(Arc::new(FnEventHandler(move |e: Event| {
            sink.lock().unwrap().push(e);
        })))
        .build()
        .unwrap();

    let d = generate_daily_challenge(&session, ProficiencyLevel::Advanced).await;
    assert_eq!(d.origin, Origin::Network);

    let events = events.lock().unwrap().clone();
    assert_eq!(events.first(), Some(&Event::FeatureStart { feature: "daily" }));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::TransportRetry { attempt: 1, delay_ms: 2000, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CallerRetry { attempt: 1, .. })));
    assert_eq!(
        events.last(),
        Some(&Event::FeatureEnd {
            feature: "daily",
            ok: true
        })
    );
}

#[test]
fn invalid_transition_message() {
    let err = FlowError::InvalidTransition {
        from: "success",
        action: "retry",
    };
    assert_eq!(err.to_string(), "cannot retry while success");
}
