//! Error types for model output parsing.

/// Errors returned by the structured-output parser and shape validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The reply was empty or whitespace-only once fences were removed.
    #[error("empty LLM response")]
    EmptyResponse,

    /// The fence-stripped text is not well-formed JSON.
    #[error("could not decode JSON from LLM response: {reason} (text: {text})")]
    Decode {
        /// The serde error message.
        reason: String,
        /// A truncated copy of the stripped text (max 200 bytes).
        text: String,
    },

    /// Well-formed JSON that does not carry what the expected record needs.
    #[error("{shape} payload rejected: {reason}")]
    Shape {
        /// The record the caller expected (e.g. `"lesson"`).
        shape: &'static str,
        /// Which requirement failed.
        reason: String,
    },
}

impl ParseError {
    /// `true` for well-formed output that failed shape validation.
    pub fn is_shape(&self) -> bool {
        matches!(self, ParseError::Shape { .. })
    }

    pub(crate) fn shape(shape: &'static str, reason: impl Into<String>) -> Self {
        ParseError::Shape {
            shape,
            reason: reason.into(),
        }
    }
}

/// Truncate a string to at most `max_len` bytes, appending "..." if truncated.
///
/// Cuts on a char boundary so model output in any script is safe to slice.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
