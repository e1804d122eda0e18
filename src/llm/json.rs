//! JSON extraction from free-form LLM output.
//!
//! Models asked for strict JSON still wrap it in Markdown fences or prose.
//! The first balanced `{...}` span is taken after fences are stripped.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonExtractError {
    #[error("no JSON object found in response")]
    NoObject,
    #[error("invalid JSON object: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "sql", ...) on the opening line.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// First balanced `{...}` span, ignoring braces inside string literals.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip fences, extract the first object and deserialize it.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, JsonExtractError> {
    let body = strip_code_fences(text);
    let object = first_json_object(body).ok_or(JsonExtractError::NoObject)?;
    Ok(serde_json::from_str(object)?)
}
