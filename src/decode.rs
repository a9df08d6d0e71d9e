//! Tolerant decoding of reasoning-service replies.
//!
//! The service may return bare JSON, JSON inside a ```` ```json ```` fence,
//! JSON inside an unlabeled fence, or JSON embedded in prose. [`parse_json`]
//! tries each shape in order and deserializes the first candidate into the
//! target type. Both generation stages build their failure policies on this
//! one primitive.

use serde::de::DeserializeOwned;

/// Errors returned by the reply decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The reply was empty or whitespace-only.
    #[error("empty reply")]
    EmptyResponse,

    /// A JSON candidate was found but failed to deserialize into the target type.
    #[error("JSON deserialization failed: {reason}")]
    DeserializationFailed {
        /// The serde error message.
        reason: String,
        /// A truncated copy of the candidate JSON (max 200 bytes).
        raw_json: String,
    },

    /// The outline decoded but contained no usable slides.
    #[error("reply contained no slides")]
    EmptySlides,

    /// A structured result was requested but the reply carried none.
    #[error("reply carried no structured result")]
    MissingStructured,

    /// The reply's structured result was tagged with an unexpected schema name.
    #[error("structured result named '{got}', expected '{expected}'")]
    SchemaMismatch {
        /// The schema name that was requested.
        expected: String,
        /// The schema name the reply actually carried.
        got: String,
    },

    /// The structured payload was missing required content.
    #[error("structured payload invalid: {0}")]
    InvalidPayload(String),
}

/// Parse a reasoning-service reply into a typed value.
///
/// Strategies (in order):
/// 1. Direct deserialize of the trimmed reply
/// 2. Content of a ```` ```json ```` code block
/// 3. Content of any code block that starts with `{` or `[`
/// 4. Bracket-match a JSON object (`{...}`)
/// 5. Bracket-match a JSON array (`[...]`)
///
/// # Examples
///
/// ```
/// use serde::Deserialize;
/// use deckgen::decode::parse_json;
///
/// #[derive(Deserialize)]
/// struct Outline { slides: Vec<String> }
///
/// let reply = "構成案です:\n```json\n{\"slides\": [\"導入\", \"まとめ\"]}\n```";
/// let outline: Outline = parse_json(reply).unwrap();
/// assert_eq!(outline.slides.len(), 2);
/// ```
pub fn parse_json<T: DeserializeOwned>(reply: &str) -> Result<T, DecodeError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }

    let candidate = json_candidate(trimmed);
    serde_json::from_str(candidate).map_err(|e| DecodeError::DeserializationFailed {
        reason: e.to_string(),
        raw_json: truncate(candidate, 200),
    })
}

/// Pick the most plausible JSON substring of a reply.
///
/// Falls back to the full text when no strategy matches, so the caller
/// gets a serde error naming what was actually there.
fn json_candidate(text: &str) -> &str {
    if serde_json::from_str::<serde_json::Value>(text).is_ok() {
        return text;
    }

    if let Some(content) = extract_code_block_for(text, "json") {
        return content;
    }

    if let Some((_lang, content)) = extract_code_block(text) {
        let content = content.trim();
        if content.starts_with('{') || content.starts_with('[') {
            return content;
        }
    }

    if let Some(obj) = find_bracketed(text, '{', '}') {
        return obj;
    }

    if let Some(arr) = find_bracketed(text, '[', ']') {
        return arr;
    }

    text
}

/// Extract content from the first markdown code block.
///
/// Searches for `` ```lang `` and bare `` ``` `` fences.
/// Returns `(language_hint, content)` where hint is `None` for bare fences.
pub fn extract_code_block(text: &str) -> Option<(Option<&str>, &str)> {
    let mut search_from = 0;
    while let Some(fence_start) = text[search_from..].find("```") {
        let abs_fence = search_from + fence_start;
        let after_backticks = abs_fence + 3;

        // Language hint: everything between ``` and the next newline
        let line_end = text[after_backticks..].find('\n')?;
        let lang_str = text[after_backticks..after_backticks + line_end].trim();
        let lang = if lang_str.is_empty() {
            None
        } else {
            Some(lang_str)
        };

        let content_start = after_backticks + line_end + 1;

        if let Some(close_offset) = text[content_start..].find("```") {
            let content = text[content_start..content_start + close_offset].trim();
            return Some((lang, content));
        }

        search_from = after_backticks;
    }
    None
}

/// Extract content from a code block tagged with a specific language.
///
/// e.g. `extract_code_block_for(text, "json")` looks for `` ```json `` blocks.
pub fn extract_code_block_for<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(fence_start) = text[search_from..].find("```") {
        let abs_fence = search_from + fence_start;
        let after_backticks = abs_fence + 3;

        if let Some(line_end) = text[after_backticks..].find('\n') {
            let lang_str = text[after_backticks..after_backticks + line_end].trim();
            let content_start = after_backticks + line_end + 1;

            if lang_str.eq_ignore_ascii_case(lang) {
                if let Some(close_offset) = text[content_start..].find("```") {
                    let content = text[content_start..content_start + close_offset].trim();
                    return Some(content);
                }
            }

            search_from = content_start;
        } else {
            break;
        }
    }
    None
}

/// Find a bracketed substring by matching open/close delimiters.
///
/// Handles nesting and skips brackets inside string literals. Prefers the
/// last complete region, which is more likely to be the model's answer than
/// an example earlier in the reply.
pub fn find_bracketed(text: &str, open: char, close: char) -> Option<&str> {
    let mut best: Option<&str> = None;
    let mut scan_from = 0;

    while scan_from < text.len() {
        if let Some(offset) = text[scan_from..].find(open) {
            let start = scan_from + offset;
            let mut depth = 0;
            let mut in_string = false;
            let mut escape_next = false;
            let mut found_end = None;

            for (i, ch) in text[start..].char_indices() {
                if escape_next {
                    escape_next = false;
                    continue;
                }
                if ch == '\\' && in_string {
                    escape_next = true;
                    continue;
                }
                if ch == '"' {
                    in_string = !in_string;
                    continue;
                }
                if in_string {
                    continue;
                }
                if ch == open {
                    depth += 1;
                } else if ch == close {
                    depth -= 1;
                    if depth == 0 {
                        found_end = Some(start + i);
                        break;
                    }
                }
            }

            if let Some(end) = found_end {
                best = Some(&text[start..=end]);
                scan_from = end + 1;
            } else {
                break;
            }
        } else {
            break;
        }
    }

    best
}

/// Truncate a string to at most `max_len` bytes, appending "..." if cut.
/// Replies are mostly Japanese, so the cut must land on a char boundary.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
