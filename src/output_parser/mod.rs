//! # Structured-Output Parser
//!
//! Turns raw model text into a decoded JSON value, or reports why it could
//! not. Malformed model output is common and expected, so nothing in this
//! module panics or guesses: it either decodes or returns a [`ParseError`].
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`strip_code_fences`] | Remove `` ``` `` / `` ```json `` markers and trim |
//! | [`parse_json_value`] | Strip fences, then strictly decode to `Value` |
//! | [`parse_json`] | Same, then deserialize into a typed struct |
//!
//! Shape validation (required fields, index ranges) lives with the record
//! types in [`schema`](crate::schema).

pub mod error;
pub mod extract;
pub mod json;

pub use error::ParseError;
pub use extract::strip_code_fences;
pub use json::{parse_json, parse_json_value};
