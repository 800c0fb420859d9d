//! Strict JSON decoding of fence-stripped model output.
//!
//! Unlike a lenient extractor, nothing here searches for brackets or
//! repairs malformed JSON. Model output that does not decode is reported
//! as [`ParseError::Decode`] so the caller can retry the request.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::output_parser::error::{truncate, ParseError};
use crate::output_parser::extract::strip_code_fences;

/// Decode a model reply into a generic JSON value tree.
///
/// Steps:
/// 1. Remove Markdown fence markers and trim.
/// 2. Strictly decode what remains.
///
/// # Examples
///
/// ```
/// use grammarflow::output_parser::parse_json_value;
///
/// let v = parse_json_value("```json\n{\"title\": \"T\"}\n```").unwrap();
/// assert_eq!(v["title"], "T");
/// assert!(parse_json_value("Sorry, I can't help with that.").is_err());
/// ```
pub fn parse_json_value(response: &str) -> Result<Value, ParseError> {
    let cleaned = strip_code_fences(response);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }
    serde_json::from_str::<Value>(&cleaned).map_err(|e| ParseError::Decode {
        reason: e.to_string(),
        text: truncate(&cleaned, 200),
    })
}

/// Decode a model reply straight into `T`, without shape validation.
///
/// A reply that is valid JSON but does not deserialize into `T` is reported
/// as a shape failure under the name `expected`.
pub fn parse_json<T: DeserializeOwned>(
    response: &str,
    expected: &'static str,
) -> Result<T, ParseError> {
    let value = parse_json_value(response)?;
    serde_json::from_value(value).map_err(|e| ParseError::shape(expected, e.to_string()))
}
