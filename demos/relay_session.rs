//! Generate a real lesson through the configured transport.
//!
//! ```text
//! GRAMMARFLOW_BASE_URL=http://localhost:3000 cargo run --example relay_session -- 4 Intermediate
//! GRAMMARFLOW_TRANSPORT=direct GEMINI_API_KEY=... cargo run --example relay_session
//! ```
//!
//! Arguments: topic id (default 1) and level (default Beginner).

use std::sync::Arc;

use grammarflow::catalog::topic_by_id;
use grammarflow::{FlowConfig, LessonController, ProficiencyLevel, Session, TOPICS};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    grammarflow::telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let topic_id: u32 = args.next().map(|a| a.parse()).transpose()?.unwrap_or(1);
    let level: ProficiencyLevel = args
        .next()
        .map(|a| a.parse())
        .transpose()?
        .unwrap_or_default();

    let Some(topic) = topic_by_id(topic_id) else {
        eprintln!("unknown topic {}; available:", topic_id);
        for t in TOPICS.iter() {
            eprintln!("  {:>2}  {}", t.id, t.title);
        }
        std::process::exit(2);
    };

    let config = FlowConfig::from_env()?;
    let session = Arc::new(Session::from_config(&config)?);
    println!("{:?}", session);

    let controller = LessonController::new(session);
    let state = controller.load(topic.title, level).await?;
    match state.value() {
        Some(lesson) => {
            println!("# {}\n\n{}\n\n{}", lesson.title, lesson.intro, lesson.theory);
            for example in &lesson.examples {
                println!("  - {}", example);
            }
            println!("\nQuiz: {}", lesson.quiz.question);
            for (i, option) in lesson.quiz.options.iter().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
        }
        None => {
            eprintln!("lesson unavailable: {}", state.error().unwrap_or("unknown error"));
            std::process::exit(1);
        }
    }
    Ok(())
}
