//! JSON extraction utilities for parsing LLM responses.
//!
//! Replies requested with a JSON response flag are usually clean, but models
//! still wrap objects in markdown fences or add explanatory text. Extraction
//! tries, in order:
//! 1. Strict parse of the whole (trimmed) content
//! 2. The contents of a ```json (or bare ```) code block
//! 3. The first balanced `{...}` object anywhere in the content
//!
//! # Example
//!
//! ```
//! use product_forge::utils::json_extraction::parse_json_object;
//!
//! let reply = "Here you go: {\"name\": \"example\", \"value\": 42} hope it helps";
//! let value = parse_json_object(reply).unwrap();
//! assert_eq!(value["value"], 42);
//! ```

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("No JSON object found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },

    #[error("JSON appears truncated: {unclosed_braces} unclosed braces")]
    Truncated { unclosed_braces: usize },

    #[error("Candidate JSON failed to parse: {0}")]
    Invalid(String),
}

/// Parse an LLM reply into a JSON object, repairing common wrappers.
///
/// Only objects are accepted: every stage asks for an object at the top
/// level, so a bare array or scalar counts as a failure.
pub fn parse_json_object(content: &str) -> Result<Value, JsonExtractionError> {
    let trimmed = content.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(block) = extract_from_code_block(trimmed) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&block) {
            return Ok(value);
        }
    }

    match find_first_object(trimmed) {
        Some(candidate) => serde_json::from_str::<Value>(candidate)
            .map_err(|e| JsonExtractionError::Invalid(e.to_string()))
            .and_then(|value| match value {
                Value::Object(_) => Ok(value),
                _ => Err(JsonExtractionError::Invalid("not an object".to_string())),
            }),
        None => {
            let unclosed = unclosed_braces(trimmed);
            if unclosed > 0 {
                Err(JsonExtractionError::Truncated {
                    unclosed_braces: unclosed,
                })
            } else {
                Err(JsonExtractionError::NotFound {
                    content_preview: trimmed.chars().take(50).collect(),
                })
            }
        }
    }
}

fn code_block_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()
}

/// Extract the first object found inside a fenced code block.
pub fn extract_from_code_block(content: &str) -> Option<String> {
    let caps = code_block_regex()?.captures(content)?;
    let block = caps.get(1)?.as_str().trim();
    let start = block.find('{')?;
    let end = find_matching_brace(&block[start..])?;
    Some(block[start..=start + end].to_string())
}

/// Return the first balanced `{...}` substring of `content`.
pub fn find_first_object(content: &str) -> Option<&str> {
    let mut offset = 0;
    while let Some(rel) = content[offset..].find('{') {
        let start = offset + rel;
        if let Some(end) = find_matching_brace(&content[start..]) {
            return Some(&content[start..=start + end]);
        }
        offset = start + 1;
    }
    None
}

/// Find the index of the brace closing the one at position 0.
///
/// Braces inside string literals (including escaped quotes) are ignored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn unclosed_braces(s: &str) -> usize {
    let mut depth: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;
    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_object() {
        let value = parse_json_object(r#"  {"a": 1}  "#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_fenced_block() {
        let content = "Sure!\n```json\n{\"price_ranges\": []}\n```\nDone.";
        let value = parse_json_object(content).unwrap();
        assert!(value["price_ranges"].is_array());
    }

    #[test]
    fn test_bare_fence_without_language() {
        let content = "```\n{\"ok\": true}\n```";
        assert_eq!(parse_json_object(content).unwrap()["ok"], true);
    }

    #[test]
    fn test_embedded_object_with_braces_in_strings() {
        let content = r#"思考完毕。结果: {"reason": "uses {curly} and \"quotes\"", "n": 2} 以上"#;
        let value = parse_json_object(content).unwrap();
        assert_eq!(value["n"], 2);
        assert_eq!(value["reason"], "uses {curly} and \"quotes\"");
    }

    #[test]
    fn test_first_balanced_object_wins() {
        let content = r#"{"first": 1} and {"second": 2}"#;
        // Strict parse fails on trailing text, so the scan picks the first.
        let value = parse_json_object(content).unwrap();
        assert_eq!(value["first"], 1);
        assert!(value.get("second").is_none());
    }

    #[test]
    fn test_top_level_array_rejected() {
        assert!(parse_json_object("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_truncated_reply() {
        let err = parse_json_object(r#"{"price_ranges": [{"label": "入门""#).unwrap_err();
        assert_eq!(err, JsonExtractionError::Truncated { unclosed_braces: 2 });
    }

    #[test]
    fn test_no_json_at_all() {
        let err = parse_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, JsonExtractionError::NotFound { .. }));
    }

    #[test]
    fn test_find_matching_brace_nested() {
        let s = r#"{"a": {"b": [1, {"c": 2}]}} tail"#;
        let end = find_matching_brace(s).unwrap();
        assert_eq!(&s[..=end], r#"{"a": {"b": [1, {"c": 2}]}}"#);
    }
}
