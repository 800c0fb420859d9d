//! # grammarflow
//!
//! The generation pipeline behind an AI grammar tutor: lessons, a daily
//! challenge question, a chat tutor, and writing feedback, all produced by a
//! remote text-generation model that is sometimes slow, sometimes empty and
//! often wraps its JSON in Markdown fences.
//!
//! ## Core Concepts
//!
//! - **[`Backend`]**: pluggable transport. [`RelayBackend`] talks to a
//!   first-party relay, [`GeminiBackend`] to the provider directly,
//!   [`MockBackend`] to nobody.
//! - **[`backend::generate`]**: one attempt with a hard timeout, classified
//!   as a [`GenerationOutcome`]. Never fails.
//! - **[`backend::request_with_retry`]**: bounded retry with linear backoff
//!   ([`BackoffConfig`]). Returns text, possibly empty. Never fails.
//! - **[`schema::parse_shape`]**: fence stripping, strict JSON decoding and
//!   shape validation into [`LessonContent`], [`QuizData`] or
//!   [`AnalysisResult`].
//! - **[`ResponseCache`]**: session-scoped, keyed by [`Fingerprint`].
//! - **[`features`]**: the four feature callers and their
//!   `Idle → Loading → Success | Failed` controllers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use grammarflow::features::lesson::generate_lesson;
//! use grammarflow::{FlowConfig, ProficiencyLevel, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     grammarflow::telemetry::init_tracing();
//!     let session = Arc::new(Session::from_config(&FlowConfig::from_env()?)?);
//!
//!     let lesson = generate_lesson(&session, "Passive Voice", ProficiencyLevel::Beginner).await?;
//!     println!("{}\n\n{}", lesson.value.title, lesson.value.theory);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod features;
pub mod output_parser;
pub mod prompt;
pub mod schema;
pub mod session;
pub mod telemetry;

pub use backend::{
    Backend, BackoffConfig, ExhaustionPolicy, GeminiBackend, GenerationOutcome,
    GenerationRequest, MockBackend, RelayBackend,
};
pub use cache::{Fingerprint, ResponseCache};
pub use catalog::{ProficiencyLevel, Topic, TOPICS};
pub use config::{FlowConfig, Prompts, Transport};
pub use error::{FlowError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use features::{
    ChatSession, DailyChallengeController, Delivery, FeatureState, LessonController, Origin,
    WritingLab,
};
pub use output_parser::ParseError;
pub use schema::{AnalysisResult, LessonContent, QuizData, StructuredPayload};
pub use session::{Session, SessionBuilder};
