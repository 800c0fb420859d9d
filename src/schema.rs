//! Typed result records and their shape validation.
//!
//! The parser only proves that model output is well-formed JSON. Whether it
//! is a usable lesson, quiz, or writing analysis is decided here: each record
//! implements [`Shape`], and [`parse_shape`] rejects anything that does not
//! conform instead of letting callers poke at optional fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::output_parser::{parse_json_value, ParseError};

/// A record type that model output can be validated against.
pub trait Shape: DeserializeOwned {
    /// Name used in diagnostics (`"lesson"`, `"quiz"`, `"analysis"`).
    const NAME: &'static str;

    /// Check requirements serde cannot express (non-blank text, index ranges).
    fn validate(&self) -> Result<(), ParseError>;
}

/// A multiple-choice question. Used on its own as the daily challenge and
/// embedded in every lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizData {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options` of the right answer.
    pub correct: usize,
    #[serde(default)]
    pub explanation: String,
}

impl QuizData {
    /// Whether `choice` is the right answer.
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct
    }

    fn check(&self, shape: &'static str) -> Result<(), ParseError> {
        if self.question.trim().is_empty() {
            return Err(ParseError::shape(shape, "quiz question is blank"));
        }
        if self.options.is_empty() {
            return Err(ParseError::shape(shape, "quiz has no options"));
        }
        if self.correct >= self.options.len() {
            return Err(ParseError::shape(
                shape,
                format!(
                    "correct index {} out of range for {} option(s)",
                    self.correct,
                    self.options.len()
                ),
            ));
        }
        Ok(())
    }
}

impl Shape for QuizData {
    const NAME: &'static str = "quiz";

    fn validate(&self) -> Result<(), ParseError> {
        self.check(Self::NAME)
    }
}

/// A generated grammar lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub intro: String,
    /// Grammar rules, Markdown allowed.
    pub theory: String,
    #[serde(default)]
    pub examples: Vec<String>,
    pub quiz: QuizData,
}

impl Shape for LessonContent {
    const NAME: &'static str = "lesson";

    fn validate(&self) -> Result<(), ParseError> {
        if self.theory.trim().is_empty() {
            return Err(ParseError::shape(Self::NAME, "theory is blank"));
        }
        self.quiz.check(Self::NAME)
    }
}

/// Feedback on a learner's sentence from the writing lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub corrected: String,
    pub is_correct: bool,
    pub analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub better_way: Option<String>,
}

impl Shape for AnalysisResult {
    const NAME: &'static str = "analysis";

    fn validate(&self) -> Result<(), ParseError> {
        if self.analysis.trim().is_empty() {
            return Err(ParseError::shape(Self::NAME, "analysis is blank"));
        }
        Ok(())
    }
}

/// Decode and validate model output as `T`.
///
/// Decode failures surface as [`ParseError::Decode`] / [`ParseError::EmptyResponse`];
/// anything well-formed but unusable as [`ParseError::Shape`].
///
/// # Examples
///
/// ```
/// use grammarflow::schema::{parse_shape, QuizData};
///
/// let raw = r#"```json
/// {"question": "Q", "options": ["a", "b"], "correct": 1, "explanation": "x"}
/// ```"#;
/// let quiz: QuizData = parse_shape(raw).unwrap();
/// assert!(quiz.is_correct(1));
///
/// let bad = r#"{"question": "Q", "options": ["a", "b"], "correct": 5, "explanation": "x"}"#;
/// assert!(parse_shape::<QuizData>(bad).unwrap_err().is_shape());
/// ```
pub fn parse_shape<T: Shape>(raw: &str) -> Result<T, ParseError> {
    let value = parse_json_value(raw)?;
    from_value_checked(value)
}

/// Validate an already decoded value as `T`.
pub fn from_value_checked<T: Shape>(value: Value) -> Result<T, ParseError> {
    if !value.is_object() {
        return Err(ParseError::shape(T::NAME, "expected a JSON object"));
    }
    let record: T =
        serde_json::from_value(value).map_err(|e| ParseError::shape(T::NAME, e.to_string()))?;
    record.validate()?;
    Ok(record)
}

/// A validated record, tagged by kind. This is what the response cache stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredPayload {
    Lesson(LessonContent),
    Quiz(QuizData),
    Analysis(AnalysisResult),
}

impl StructuredPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            StructuredPayload::Lesson(_) => LessonContent::NAME,
            StructuredPayload::Quiz(_) => QuizData::NAME,
            StructuredPayload::Analysis(_) => AnalysisResult::NAME,
        }
    }

    pub fn as_lesson(&self) -> Option<&LessonContent> {
        match self {
            StructuredPayload::Lesson(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_quiz(&self) -> Option<&QuizData> {
        match self {
            StructuredPayload::Quiz(q) => Some(q),
            _ => None,
        }
    }
}

impl From<LessonContent> for StructuredPayload {
    fn from(v: LessonContent) -> Self {
        StructuredPayload::Lesson(v)
    }
}

impl From<QuizData> for StructuredPayload {
    fn from(v: QuizData) -> Self {
        StructuredPayload::Quiz(v)
    }
}

impl From<AnalysisResult> for StructuredPayload {
    fn from(v: AnalysisResult) -> Self {
        StructuredPayload::Analysis(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LESSON: &str = r#"{"title":"T","intro":"I","theory":"Th","examples":["E1"],"quiz":{"question":"Q","options":["A","B"],"correct":1,"explanation":"Exp"}}"#;

    #[test]
    fn lesson_accepted() {
        let lesson: LessonContent = parse_shape(LESSON).unwrap();
        assert_eq!(lesson.title, "T");
        assert_eq!(lesson.examples, vec!["E1"]);
        assert_eq!(lesson.quiz.correct, 1);
    }

    #[test]
    fn lesson_in_fence_matches_unfenced() {
        let fenced: LessonContent = parse_shape(&format!("```json\n{}\n```", LESSON)).unwrap();
        let bare: LessonContent = parse_shape(&format!("```\n{}\n```", LESSON)).unwrap();
        let plain: LessonContent = parse_shape(LESSON).unwrap();
        assert_eq!(fenced, plain);
        assert_eq!(bare, plain);
    }

    #[test]
    fn lesson_optional_fields_default() {
        let raw = r#"{"theory":"Th","quiz":{"question":"Q","options":["A"],"correct":0}}"#;
        let lesson: LessonContent = parse_shape(raw).unwrap();
        assert!(lesson.title.is_empty());
        assert!(lesson.examples.is_empty());
        assert!(lesson.quiz.explanation.is_empty());
    }

    #[test]
    fn lesson_without_quiz_is_shape_error() {
        let err = parse_shape::<LessonContent>(r#"{"title":"T","theory":"Th"}"#).unwrap_err();
        assert!(err.is_shape());
    }

    #[test]
    fn lesson_with_blank_theory_is_shape_error() {
        let raw = r#"{"theory":"  ","quiz":{"question":"Q","options":["A"],"correct":0}}"#;
        assert!(parse_shape::<LessonContent>(raw).unwrap_err().is_shape());
    }

    #[test]
    fn lesson_with_empty_options_is_shape_error() {
        let raw = r#"{"theory":"Th","quiz":{"question":"Q","options":[],"correct":0}}"#;
        let err = parse_shape::<LessonContent>(raw).unwrap_err();
        assert_eq!(
            err,
            ParseError::Shape {
                shape: "lesson",
                reason: "quiz has no options".into()
            }
        );
    }

    #[test]
    fn quiz_out_of_range_correct_is_shape_error() {
        let raw = r#"{"question":"Q","options":["a","b"],"correct":5,"explanation":"x"}"#;
        let err = parse_shape::<QuizData>(raw).unwrap_err();
        assert!(err.is_shape());
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn quiz_negative_correct_is_shape_error() {
        let raw = r#"{"question":"Q","options":["a","b"],"correct":-1}"#;
        assert!(parse_shape::<QuizData>(raw).unwrap_err().is_shape());
    }

    #[test]
    fn quiz_missing_options_is_shape_error() {
        let raw = r#"{"question":"Q","correct":0}"#;
        assert!(parse_shape::<QuizData>(raw).unwrap_err().is_shape());
    }

    #[test]
    fn array_is_shape_error() {
        assert!(parse_shape::<QuizData>("[1, 2]").unwrap_err().is_shape());
    }

    #[test]
    fn malformed_is_not_shape_error() {
        let err = parse_shape::<QuizData>("{\"question\": ").unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }));
    }

    #[test]
    fn analysis_camel_case() {
        let raw = r#"{"corrected":"I went.","isCorrect":false,"analysis":"Quá khứ đơn","betterWay":"I went home."}"#;
        let a: AnalysisResult = parse_shape(raw).unwrap();
        assert!(!a.is_correct);
        assert_eq!(a.better_way.as_deref(), Some("I went home."));
    }

    #[test]
    fn analysis_better_way_optional() {
        let raw = r#"{"corrected":"ok","isCorrect":true,"analysis":"fine"}"#;
        let a: AnalysisResult = parse_shape(raw).unwrap();
        assert!(a.better_way.is_none());
    }

    #[test]
    fn analysis_string_bool_is_shape_error() {
        let raw = r#"{"corrected":"ok","isCorrect":"yes","analysis":"fine"}"#;
        assert!(parse_shape::<AnalysisResult>(raw).unwrap_err().is_shape());
    }

    #[test]
    fn payload_kind() {
        let quiz: QuizData =
            parse_shape(r#"{"question":"Q","options":["a"],"correct":0}"#).unwrap();
        let payload = StructuredPayload::from(quiz.clone());
        assert_eq!(payload.kind(), "quiz");
        assert_eq!(payload.as_quiz(), Some(&quiz));
        assert!(payload.as_lesson().is_none());
    }
}
