use std::collections::BTreeMap;

use crate::features::chat::{ChatMessage, ChatRole};

/// Named values substituted into `{key}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    data: BTreeMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders in the template with values from `vars`
/// in a single pass, so braces inside a substituted value stay literal.
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`, which
/// is how the JSON skeletons inside the default prompts are written.
///
/// # Example
///
/// ```
/// use grammarflow::prompt::{render, PromptVars};
///
/// let vars = PromptVars::new().insert("level", "Beginner");
/// let result = render("Level: {level}. JSON: {{\"correct\": 0}}", &vars);
/// assert_eq!(result, r#"Level: Beginner. JSON: {"correct": 0}"#);
/// ```
pub fn render(template: &str, vars: &PromptVars) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(idx) = rest.find(is_brace) {
        rendered.push_str(&rest[..idx]);
        let tail = &rest[idx..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            rendered.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        // Values are appended as-is and never rescanned.
        if let Some((key, value)) = placeholder(tail).and_then(|k| vars.data.get_key_value(k)) {
            rendered.push_str(value);
            rest = &tail[key.len() + 2..];
            continue;
        }

        rendered.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    rendered.push_str(rest);
    rendered
}

/// The key of a `{key}` placeholder at the start of `tail`.
fn placeholder(tail: &str) -> Option<&str> {
    let inner = tail.strip_prefix('{')?;
    let end = inner.find(is_brace)?;
    inner[end..].starts_with('}').then(|| &inner[..end])
}

fn is_brace(c: char) -> bool {
    c == '{' || c == '}'
}

/// Render a chat transcript as `Student: ...` / `Teacher: ...` lines.
pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                ChatRole::User => "Student",
                ChatRole::Tutor => "Teacher",
            };
            format!("{}: {}", speaker, m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
