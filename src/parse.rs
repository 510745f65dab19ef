//! Structured-output parsing for model responses.
//!
//! Every LLM-shaped operation declares one of three output kinds — JSON,
//! delimited list, or plain text — and parses the raw response here, after
//! stripping markdown code-fence artifacts. Centralizing the parsers keeps
//! the tolerant-vs-strict recovery policy at the call sites consistent: a
//! caller decides what a [`ParseError`] means, this module only reports it.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// A response that did not match its declared output kind.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Strips a leading/trailing markdown code fence (with optional `json` tag)
/// and surrounding whitespace.
pub fn strip_code_fences(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the fence line itself, tag included.
        text = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parses a fence-stripped response as JSON into `T`.
pub fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T, ParseError> {
    Ok(serde_json::from_str(strip_code_fences(response))?)
}

/// Parses a fence-stripped response as a comma-delimited list.
///
/// Bracket, quote, and newline noise is removed before splitting; empty
/// items are discarded. This parser never fails — unusable input yields an
/// empty list.
pub fn parse_delimited_list(response: &str) -> Vec<String> {
    strip_code_fences(response)
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '"' | '\'' | '\n'))
        .collect::<String>()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalizes a fence-stripped response into a single line of plain text.
pub fn parse_plain_text(response: &str) -> String {
    strip_code_fences(response).replace('\n', "")
}
