//! Deployment configuration and prompt templates, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! relay-backed session with the stock prompts. Example:
//!
//! ```toml
//! transport = "direct"
//! api_key = "AIza..."
//! timeout_ms = 30000
//!
//! [prompts]
//! chat_system = "You are a patient English tutor."
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::gemini;
use crate::error::{FlowError, Result};

/// Relay used when no base URL is configured.
pub const DEFAULT_RELAY_URL: &str = "https://english-tutor-grammar-server.onrender.com";

/// How requests reach the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Through the first-party relay (no credentials on the client).
    #[default]
    Relay,
    /// Straight to the provider with an embedded API key.
    Direct,
}

impl std::str::FromStr for Transport {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" => Ok(Transport::Relay),
            "direct" => Ok(Transport::Direct),
            other => Err(FlowError::InvalidConfig(format!("unknown transport: '{}'", other))),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub transport: Transport,
    /// Relay or provider base URL. `None` picks the transport's default.
    pub base_url: Option<String>,
    /// Provider key; required for [`Transport::Direct`].
    pub api_key: Option<String>,
    /// Provider model name (direct transport only).
    pub model: String,
    /// Per-attempt timeout. Generous because a sleeping relay can take close
    /// to a minute to answer its first request.
    pub timeout_ms: u64,
    /// Linear backoff unit. `None` picks 2000 ms for relay, 1000 ms for direct.
    pub base_delay_ms: Option<u64>,
    /// Transport retries after the first attempt.
    pub max_retries: u32,
    /// Extra generate-and-parse rounds for lessons.
    pub lesson_retries: u32,
    /// Extra generate-and-parse rounds for the daily challenge.
    pub daily_retries: u32,
    /// Pause between caller-level rounds.
    pub caller_retry_delay_ms: u64,
    pub prompts: Prompts,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Relay,
            base_url: None,
            api_key: None,
            model: gemini::DEFAULT_MODEL.to_string(),
            timeout_ms: 60_000,
            base_delay_ms: None,
            max_retries: 2,
            lesson_retries: 2,
            daily_retries: 2,
            caller_retry_delay_ms: 1000,
            prompts: Prompts::default(),
        }
    }
}

impl FlowConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: FlowConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&text)?;
        info!(path = %path.display(), transport = ?cfg.transport, "loaded grammarflow config");
        Ok(cfg)
    }

    /// Build from the environment.
    ///
    /// - `GRAMMARFLOW_CONFIG`: optional TOML file to start from
    /// - `GRAMMARFLOW_TRANSPORT`: `relay` or `direct`
    /// - `GRAMMARFLOW_BASE_URL`: relay/provider base URL
    /// - `GEMINI_API_KEY`: provider key for the direct transport
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("GRAMMARFLOW_CONFIG") {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(t) = std::env::var("GRAMMARFLOW_TRANSPORT") {
            cfg.transport = t.parse()?;
        }
        if let Ok(url) = std::env::var("GRAMMARFLOW_BASE_URL") {
            cfg.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            cfg.api_key = Some(key);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(FlowError::InvalidConfig("timeout_ms must be positive".into()));
        }
        if self.transport == Transport::Direct
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(FlowError::InvalidConfig(
                "direct transport requires api_key (or GEMINI_API_KEY)".into(),
            ));
        }
        if self.transport == Transport::Relay && self.api_key.is_some() {
            warn!("api_key is ignored by the relay transport");
        }
        Ok(())
    }

    pub fn resolved_base_url(&self) -> String {
        match (&self.base_url, self.transport) {
            (Some(url), _) => url.clone(),
            (None, Transport::Relay) => DEFAULT_RELAY_URL.to_string(),
            (None, Transport::Direct) => gemini::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn caller_retry_delay(&self) -> Duration {
        Duration::from_millis(self.caller_retry_delay_ms)
    }
}

/// Prompt templates. Placeholders: `{topic}`, `{level}`, `{history}`,
/// `{message}`, `{text}`. Literal braces are written `{{` / `}}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub lesson_system: String,
    pub lesson_template: String,
    pub daily_system: String,
    pub daily_template: String,
    pub chat_system: String,
    pub chat_template: String,
    pub chat_greeting: String,
    pub writing_system: String,
    pub writing_template: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            lesson_system: "You are a JSON API.".into(),
            lesson_template: r#"Topic: "{topic}". Level: "{level}".
Role: English Teacher for Vietnamese students.
Task: Create a concise grammar lesson.

Required JSON Structure (strict):
{{
  "title": "Title (English/Vietnamese)",
  "intro": "Why it is important (Vietnamese)",
  "theory": "Grammar rules (Vietnamese, markdown supported)",
  "examples": ["Ex 1 (Eng)", "Ex 2 (Eng)", "Ex 3 (Eng)"],
  "quiz": {{
    "question": "Question (Eng)",
    "options": ["A", "B", "C"],
    "correct": 0,
    "explanation": "Explanation (Vietnamese)"
  }}
}}"#
                .into(),
            daily_system: "You are a JSON API.".into(),
            daily_template: r#"Level: {level}. Create 1 Grammar MCQ.
JSON Output: {{ "question": "Eng", "options": ["A","B","C","D"], "correct": 0, "explanation": "Vietnamese" }}"#
                .into(),
            chat_system: "You are a helpful English tutor.".into(),
            chat_template: "History: {history}\nStudent: {message}\nRole: Eng Tutor (Vietnamese context). Level: {level}. Explain in Vietnamese, examples in English.".into(),
            chat_greeting: "Chào bạn! Mình là Gia sư AI. Mình có thể giải thích ngữ pháp hoặc luyện tập ở trình độ **{level}**. Hôm nay chúng ta học gì nào?".into(),
            writing_system: "Bạn là chuyên gia ngữ pháp trả về JSON.".into(),
            writing_template: r#"Analyze: "{text}". Level: {level}. JSON Output: {{ "corrected": "string", "isCorrect": bool, "analysis": "Vietnamese", "betterWay": "string" }}"#.into(),
        }
    }
}
