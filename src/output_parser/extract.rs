//! Decoration stripping applied to every model reply before decoding.
//!
//! Models asked for JSON frequently wrap it in a Markdown code fence
//! (`` ```json ... ``` ``) even when told not to. Only fence markers are
//! removed here; surrounding prose is left alone so that chatty replies
//! fail to decode instead of being guessed at.

const FENCE: &str = "```";

/// Remove every Markdown fence marker from `text`, then trim.
///
/// A fence marker is three backticks, removed wherever they occur. A
/// `json` tag (any case) directly after the backticks goes with them. Any
/// other language tag (`json5`, `c++`, ...) is only removed when the fence
/// opens a line and the tag runs to the end of that line, so inline
/// backticks inside string values keep their words.
///
/// # Examples
///
/// ```
/// use grammarflow::output_parser::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
/// assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
/// ```
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find(FENCE) {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + FENCE.len()..];
        let tag_len = after
            .char_indices()
            .find(|(_, c)| !is_tag_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(after.len());
        let (tag, tail) = after.split_at(tag_len);

        let strip_tag = tag.eq_ignore_ascii_case("json")
            || (opens_line(&out) && ends_line(tail));
        rest = if strip_tag { tail } else { after };
    }
    out.push_str(rest);

    out.trim().to_string()
}

fn opens_line(before: &str) -> bool {
    before
        .rsplit('\n')
        .next()
        .map_or(true, |line| line.trim().is_empty())
}

fn ends_line(tail: &str) -> bool {
    let tail = tail.trim_start_matches(|c: char| c == ' ' || c == '\t');
    tail.is_empty() || tail.starts_with('\n') || tail.starts_with('\r')
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')
}
