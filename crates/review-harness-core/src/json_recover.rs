//! Lenient JSON recovery for model output.
//!
//! Language models wrap JSON in code fences, surround it with prose, or
//! stop mid-array when they hit a token limit. [`recover`] turns such
//! text back into a [`serde_json::Value`] when that can be done without
//! guessing, and fails with [`UnrecoverableJson`] otherwise.
//!
//! Recovery steps, first success wins:
//!
//! 1. Strip code fences and parse as-is.
//! 2. Parse the first balanced `{...}` or `[...]` span in the text.
//! 3. For a truncated array, keep every complete top-level object.
//! 4. For a truncated object, close the open string and brackets.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Text that no recovery step could turn into JSON.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecoverable JSON in model output: {excerpt}")]
pub struct UnrecoverableJson {
    /// First 120 characters of the offending text.
    pub excerpt: String,
}

impl UnrecoverableJson {
    fn from_text(text: &str) -> Self {
        Self {
            excerpt: text.chars().take(120).collect(),
        }
    }
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fences(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Recover a JSON value from model output.
pub fn recover(text: &str) -> Result<Value, UnrecoverableJson> {
    let body = strip_code_fences(text);
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        return Ok(v);
    }

    let Some(start) = body.find(|c: char| c == '{' || c == '[') else {
        return Err(UnrecoverableJson::from_text(text));
    };

    match scan(body, start) {
        Scan::Closed(end) => serde_json::from_str(&body[start..end])
            .map_err(|_| UnrecoverableJson::from_text(text)),
        Scan::Open { stack, in_string } => {
            if body[start..].starts_with('[') {
                let objects = complete_array_objects(body, start);
                if !objects.is_empty() {
                    return Ok(Value::Array(objects));
                }
            }
            let mut repaired = body[start..].trim_end().to_string();
            if in_string {
                repaired.push('"');
            }
            for closer in stack.iter().rev() {
                repaired.push(*closer);
            }
            serde_json::from_str(&repaired).map_err(|_| UnrecoverableJson::from_text(text))
        }
        Scan::Malformed => Err(UnrecoverableJson::from_text(text)),
    }
}

/// [`recover`] and deserialize into `T`.
pub fn recover_as<T: DeserializeOwned>(text: &str) -> Result<T, UnrecoverableJson> {
    let value = recover(text)?;
    serde_json::from_value(value).map_err(|_| UnrecoverableJson::from_text(text))
}

enum Scan {
    /// Balanced; the byte offset one past the closing bracket.
    Closed(usize),
    /// Text ended with brackets still open.
    Open { stack: Vec<char>, in_string: bool },
    /// A closer that does not match the innermost opener.
    Malformed,
}

fn scan(s: &str, start: usize) -> Scan {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return Scan::Malformed;
                }
                if stack.is_empty() {
                    return Scan::Closed(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    Scan::Open { stack, in_string }
}

/// Complete objects directly inside the array opened at `start`.
fn complete_array_objects(s: &str, start: usize) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut object_start: Option<usize> = None;

    for (i, c) in s[start..].char_indices() {
        let at = start + i;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => {
                if depth == 1 && c == '{' {
                    object_start = Some(at);
                }
                depth += 1;
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 1 && c == '}' {
                    if let Some(from) = object_start.take() {
                        if let Ok(v) = serde_json::from_str(&s[from..=at]) {
                            objects.push(v);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}
