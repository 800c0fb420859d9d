//! Session-scoped response cache.
//!
//! Maps a [`Fingerprint`] (the parameters that fully determine a prompt) to
//! the validated record produced for it. There is no TTL, no size bound and
//! no persistence: the request space (topics x levels) is small and the
//! cache lives exactly as long as the [`Session`](crate::Session) that owns it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::catalog::ProficiencyLevel;
use crate::schema::{LessonContent, QuizData, StructuredPayload};

/// Deterministic key for a cacheable generation request.
///
/// Equal fingerprints render the same prompt, so a cached result for one is
/// a valid answer for the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Lesson {
        topic: String,
        level: ProficiencyLevel,
    },
    DailyChallenge {
        level: ProficiencyLevel,
    },
}

impl Fingerprint {
    pub fn lesson(topic: impl Into<String>, level: ProficiencyLevel) -> Self {
        Fingerprint::Lesson {
            topic: topic.into(),
            level,
        }
    }

    pub fn daily(level: ProficiencyLevel) -> Self {
        Fingerprint::DailyChallenge { level }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Lesson { topic, level } => write!(f, "lesson:{}:{}", topic, level),
            Fingerprint::DailyChallenge { level } => write!(f, "daily:{}", level),
        }
    }
}

/// Fingerprint -> validated payload map owned by a session.
///
/// The mutex only makes the cache shareable between tasks; it is never held
/// across an `.await`. Writes to different keys are independent and a race
/// on the same key is last-write-wins.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<Fingerprint, StructuredPayload>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, StructuredPayload>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &Fingerprint) -> Option<StructuredPayload> {
        self.lock().get(key).cloned()
    }

    /// Store a payload. An existing entry for the key is replaced.
    pub fn put(&self, key: Fingerprint, payload: impl Into<StructuredPayload>) {
        self.lock().insert(key, payload.into());
    }

    /// Cached lesson for `key`, if the entry exists and is a lesson.
    pub fn get_lesson(&self, key: &Fingerprint) -> Option<LessonContent> {
        self.get(key).and_then(|p| p.as_lesson().cloned())
    }

    /// Cached quiz for `key`, if the entry exists and is a quiz.
    pub fn get_quiz(&self, key: &Fingerprint) -> Option<QuizData> {
        self.get(key).and_then(|p| p.as_quiz().cloned())
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
