//! Fenced code block extraction from README-style text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Opening fence with an optional info string, lazily matched up to the next
/// closing fence. Both fences start a line, indented by at most three spaces.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^[ \t]{0,3}```[^\n`]*\n(.*?)^[ \t]{0,3}```").expect("fenced block pattern is valid")
});

/// Extracts the trimmed contents of every triple-backtick fenced block in `text`.
///
/// Blocks of any language, tagged or not, are returned in document order.
/// Blocks that are empty after trimming are skipped and an unterminated fence
/// yields nothing. Triple backticks in the middle of a line are inline code,
/// not fences.
///
/// ```
/// use pkgresearch::extract_examples;
///
/// let readme = "Usage:\n\n```js\nleftPad('1', 2, '0')\n```\n";
/// assert_eq!(extract_examples(readme), vec!["leftPad('1', 2, '0')"]);
/// ```
pub fn extract_examples(text: &str) -> Vec<String> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim())
        .filter(|body| !body.is_empty())
        .map(str::to_string)
        .collect()
}
