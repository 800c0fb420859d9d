//! Chat tutor: free-text turns over a running transcript.
//!
//! Turns are never cached and get no caller-level retry. When the retry
//! orchestrator comes back exhausted, the tutor answers with
//! [`FALLBACK_REPLY`] instead.

use std::sync::{Arc, Mutex};

use tracing::{instrument, warn};

use super::state::{FeatureState, StateSlot};
use super::{lock_slot, Delivery};
use crate::backend::GenerationRequest;
use crate::catalog::ProficiencyLevel;
use crate::error::{FlowError, Result};
use crate::events::Event;
use crate::prompt::{render, transcript, PromptVars};
use crate::session::Session;

const FEATURE: &str = "chat";

/// Tutor reply used when the server could not be reached.
pub const FALLBACK_REPLY: &str = "Lỗi kết nối Server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Tutor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn tutor(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tutor,
            text: text.into(),
        }
    }
}

pub fn chat_request(
    session: &Session,
    history: &[ChatMessage],
    message: &str,
    level: ProficiencyLevel,
) -> GenerationRequest {
    let prompts = session.prompts();
    let vars = PromptVars::new()
        .insert("history", transcript(history))
        .insert("message", message)
        .insert("level", level.as_str());
    GenerationRequest::text(render(&prompts.chat_template, &vars))
        .with_system(prompts.chat_system.clone())
}

/// One tutor reply to `message`, given the prior `history`. Never fails.
#[instrument(skip(session, history), fields(feature = FEATURE, history_len = history.len()))]
pub async fn chat_reply(
    session: &Session,
    history: &[ChatMessage],
    message: &str,
    level: ProficiencyLevel,
) -> Delivery<String> {
    session.emit(Event::FeatureStart { feature: FEATURE });
    let request = chat_request(session, history, message, level);
    let text = session.request_with_retry(FEATURE, &request).await;

    let delivery = if session.backoff().exhaustion.is_exhaustion(&text) {
        warn!("chat reply unavailable, using fallback");
        session.emit(Event::FallbackUsed { feature: FEATURE });
        Delivery::fallback(FALLBACK_REPLY.to_string())
    } else {
        Delivery::network(text)
    };
    session.emit(Event::FeatureEnd {
        feature: FEATURE,
        ok: !delivery.is_fallback(),
    });
    delivery
}

/// A conversation with the tutor at a fixed level.
///
/// The transcript opens with the tutor's greeting. One turn may be in
/// flight at a time.
pub struct ChatSession {
    session: Arc<Session>,
    level: ProficiencyLevel,
    messages: Mutex<Vec<ChatMessage>>,
    slot: Mutex<StateSlot<Delivery<String>>>,
}

impl ChatSession {
    pub fn new(session: Arc<Session>, level: ProficiencyLevel) -> Self {
        let vars = PromptVars::new().insert("level", level.as_str());
        let greeting = render(&session.prompts().chat_greeting, &vars);
        Self {
            session,
            level,
            messages: Mutex::new(vec![ChatMessage::tutor(greeting)]),
            slot: Mutex::new(StateSlot::new()),
        }
    }

    pub fn level(&self) -> ProficiencyLevel {
        self.level
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock_messages().clone()
    }

    /// State of the latest turn (`Loading` while the tutor is typing).
    pub fn state(&self) -> FeatureState<Delivery<String>> {
        lock_slot(&self.slot).state().clone()
    }

    /// Send `input` and wait for the tutor.
    ///
    /// Blank input is ignored (`Ok(None)`). Sending while a turn is in
    /// flight is an [`FlowError::InvalidTransition`]. The reply, or the
    /// fallback, is appended to the transcript unless the chat was closed.
    pub async fn send(&self, input: &str) -> Result<Option<Delivery<String>>> {
        if input.trim().is_empty() {
            return Ok(None);
        }

        let (ticket, history) = {
            let mut slot = lock_slot(&self.slot);
            if slot.state().is_loading() {
                return Err(FlowError::InvalidTransition {
                    from: "loading",
                    action: "send",
                });
            }
            let ticket = slot.begin()?;
            let mut messages = self.lock_messages();
            let history = messages.clone();
            messages.push(ChatMessage::user(input));
            (ticket, history)
        };

        let reply = chat_reply(&self.session, &history, input, self.level).await;

        let mut slot = lock_slot(&self.slot);
        if slot.settle(ticket, Ok(reply.clone())) {
            self.lock_messages().push(ChatMessage::tutor(reply.value.clone()));
        }
        Ok(Some(reply))
    }

    pub fn close(&self) {
        lock_slot(&self.slot).teardown();
    }

    fn lock_messages(&self) -> std::sync::MutexGuard<'_, Vec<ChatMessage>> {
        self.messages.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockReply;
    use crate::backend::{BackoffConfig, MockBackend};
    use crate::features::Origin;
    use std::time::Duration;

    fn session_with(mock: Arc<MockBackend>, backoff: BackoffConfig) -> Arc<Session> {
        Arc::new(
            Session::builder("http://unused")
                .backend(mock)
                .backoff(backoff)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn greeting_mentions_level() {
        let chat = ChatSession::new(
            session_with(Arc::new(MockBackend::fixed("")), BackoffConfig::none()),
            ProficiencyLevel::Intermediate,
        );
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::Tutor);
        assert!(messages[0].text.contains("**Intermediate**"));
    }

    #[tokio::test]
    async fn send_appends_both_turns_and_renders_history() {
        let mock = Arc::new(MockBackend::fixed("Modal verbs là động từ khuyết thiếu."));
        let chat = ChatSession::new(
            session_with(mock.clone(), BackoffConfig::none()),
            ProficiencyLevel::Beginner,
        );

        let reply = chat.send("What is a modal verb?").await.unwrap().unwrap();
        assert_eq!(reply.origin, Origin::Network);

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ChatMessage::user("What is a modal verb?"));
        assert_eq!(messages[2].text, "Modal verbs là động từ khuyết thiếu.");

        let prompt = &mock.requests()[0].prompt;
        assert!(prompt.starts_with("History: Teacher: Chào bạn!"));
        assert!(prompt.contains("\nStudent: What is a modal verb?\n"));
        assert!(prompt.contains("Level: Beginner."));
        assert!(!mock.requests()[0].json_mode);
    }

    #[tokio::test]
    async fn braces_typed_by_student_survive_in_history() {
        let mock = Arc::new(MockBackend::fixed("ok"));
        let chat = ChatSession::new(
            session_with(mock.clone(), BackoffConfig::none()),
            ProficiencyLevel::Beginner,
        );

        chat.send("What does {level} mean in {message}?").await.unwrap();
        chat.send("second").await.unwrap();

        let prompt = &mock.requests()[1].prompt;
        assert!(prompt.contains("Student: What does {level} mean in {message}?\n"));
        assert!(prompt.contains("\nStudent: second\n"));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mock = Arc::new(MockBackend::fixed("hi"));
        let chat = ChatSession::new(
            session_with(mock.clone(), BackoffConfig::none()),
            ProficiencyLevel::Beginner,
        );
        assert_eq!(chat.send("   ").await.unwrap(), None);
        assert_eq!(mock.calls(), 0);
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_turn_uses_fallback_reply() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Status(502)]));
        let chat = ChatSession::new(
            session_with(mock.clone(), BackoffConfig::direct()),
            ProficiencyLevel::Beginner,
        );
        let reply = chat.send("hello").await.unwrap().unwrap();
        assert!(reply.is_fallback());
        assert_eq!(reply.value, FALLBACK_REPLY);
        assert_eq!(mock.calls(), 3);
        assert_eq!(chat.messages().last().map(|m| m.text.as_str()), Some(FALLBACK_REPLY));
    }

    #[tokio::test(start_paused = true)]
    async fn second_send_while_typing_is_rejected() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Delayed(
            Duration::from_secs(3),
            "ok".into(),
        )]));
        let chat = ChatSession::new(
            session_with(mock, BackoffConfig::none()),
            ProficiencyLevel::Beginner,
        );
        let (first, second) = tokio::join!(chat.send("one"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            chat.send("two").await
        });
        assert!(first.unwrap().is_some());
        assert!(matches!(
            second,
            Err(FlowError::InvalidTransition { from: "loading", action: "send" })
        ));
        assert_eq!(chat.messages().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_after_close_is_not_appended() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Delayed(
            Duration::from_secs(3),
            "late".into(),
        )]));
        let chat = ChatSession::new(
            session_with(mock, BackoffConfig::none()),
            ProficiencyLevel::Beginner,
        );
        let (reply, _) = tokio::join!(chat.send("hi"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            chat.close();
        });
        assert_eq!(reply.unwrap().map(|d| d.value), Some("late".to_string()));
        assert_eq!(chat.messages().len(), 2);
    }
}
