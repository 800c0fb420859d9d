//! Offline walkthrough of every feature against a scripted mock backend.
//!
//! Run with `GRAMMARFLOW_LOG=debug` to watch the retry layers.

use std::sync::Arc;

use grammarflow::backend::mock::MockReply;
use grammarflow::features::daily::generate_daily_challenge;
use grammarflow::features::lesson::generate_lesson;
use grammarflow::features::writing::analyze_writing;
use grammarflow::{
    BackoffConfig, ChatSession, Event, FnEventHandler, MockBackend, ProficiencyLevel, Session,
};

const LESSON: &str = r#"```json
{
  "title": "Passive Voice (Câu bị động)",
  "intro": "Dùng khi hành động quan trọng hơn người thực hiện.",
  "theory": "**S + be + V3/ed**",
  "examples": ["The letter was written yesterday.", "English is spoken here."],
  "quiz": {
    "question": "The cake ___ by my mother.",
    "options": ["made", "was made", "is making"],
    "correct": 1,
    "explanation": "Bị động quá khứ đơn: was + V3."
  }
}
```"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    grammarflow::telemetry::init_tracing();

    let mock = Arc::new(MockBackend::scripted(vec![
        // Lesson: the relay is still waking up on the first try.
        MockReply::Status(503),
        MockReply::Text(LESSON.into()),
        // Daily challenge.
        MockReply::Text(
            r#"{"question":"She ___ coffee.","options":["drink","drinks"],"correct":1,"explanation":"Ngôi thứ ba số ít thêm -s."}"#
                .into(),
        ),
        // Chat turn.
        MockReply::Text("Câu bị động dùng **be + V3**. Ví dụ: *The door was opened.*".into()),
        // Writing analysis.
        MockReply::Text(
            r#"{"corrected":"She doesn't like tea.","isCorrect":false,"analysis":"Chủ ngữ số ít dùng doesn't.","betterWay":"She isn't fond of tea."}"#
                .into(),
        ),
    ]));

    let session = Arc::new(
        Session::builder("http://localhost:3000")
            .backend(mock.clone())
            .backoff(BackoffConfig::relay().with_base_delay(std::time::Duration::from_millis(200)))
            .event_handler(Arc::new(FnEventHandler(|event: Event| {
                if let Event::TransportRetry { attempt, delay_ms, reason, .. } = event {
                    println!("  (retry #{} in {}ms: {})", attempt, delay_ms, reason);
                }
            })))
            .build()?,
    );

    println!("== Lesson ==");
    let lesson = generate_lesson(&session, "Passive Voice", ProficiencyLevel::Beginner).await?;
    println!("{} [{:?}]", lesson.value.title, lesson.origin);
    println!("{}", lesson.value.theory);
    let again = generate_lesson(&session, "Passive Voice", ProficiencyLevel::Beginner).await?;
    println!("second load: {:?}", again.origin);

    println!("\n== Daily challenge ==");
    let daily = generate_daily_challenge(&session, ProficiencyLevel::Beginner).await;
    println!("{}", daily.value.question);
    for (i, option) in daily.value.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }

    println!("\n== Chat ==");
    let chat = ChatSession::new(session.clone(), ProficiencyLevel::Beginner);
    chat.send("Câu bị động là gì?").await?;
    for message in chat.messages() {
        println!("{:?}: {}", message.role, message.text);
    }

    println!("\n== Writing lab ==");
    if let Some(result) =
        analyze_writing(&session, "She don't like tea.", ProficiencyLevel::Beginner).await
    {
        println!("correct: {}", result.value.is_correct);
        println!("fixed:   {}", result.value.corrected);
        println!("why:     {}", result.value.analysis);
    }

    println!("\nrequests sent: {}", mock.calls());
    Ok(())
}
