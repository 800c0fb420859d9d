use std::time::Duration;
use thiserror::Error;

use crate::output_parser::ParseError;

/// Errors produced by the generation pipeline and its components.
///
/// Transport-level variants never escape [`generate`](crate::backend::generate);
/// they are folded into a [`GenerationOutcome`](crate::backend::GenerationOutcome)
/// there. They remain public because [`Backend`](crate::backend::Backend)
/// implementations return them.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Low-level HTTP transport failure (connection refused, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON (de)serialization failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status returned by the generation endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// A single attempt exceeded the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered but the generated text was empty.
    #[error("empty model output")]
    EmptyOutput,

    /// Model output could not be decoded or failed shape validation.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Every retry across every layer was consumed for a feature request.
    #[error("{feature} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// Feature that gave up (e.g. `"lesson"`).
        feature: &'static str,
        /// Caller-level attempts made.
        attempts: u32,
        /// Description of the last failure seen.
        last_error: String,
    },

    /// A feature state machine was asked for a transition it does not allow.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        /// Name of the current state.
        from: &'static str,
        /// The rejected action.
        action: &'static str,
    },

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The TOML configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        FlowError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message() {
        let err = FlowError::Exhausted {
            feature: "lesson",
            attempts: 3,
            last_error: "empty model output".into(),
        };
        assert_eq!(
            err.to_string(),
            "lesson failed after 3 attempt(s): empty model output"
        );
    }

    #[test]
    fn test_parse_error_is_transparent() {
        let err: FlowError = ParseError::EmptyResponse.into();
        assert_eq!(err.to_string(), "empty LLM response");
    }

    #[test]
    fn test_anyhow_converts_to_other() {
        let err: FlowError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, FlowError::Other(ref m) if m == "boom"));
    }
}
