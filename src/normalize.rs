//! Best-effort query normalization (traditional → simplified Chinese).
//!
//! The query is sent to a remote conversion service under a short, hard
//! timeout. Any problem with that call degrades silently to the trimmed
//! original text: [`QueryNormalizer::normalize`] always returns a usable
//! string and never returns an empty one for non-empty input.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::config::NormalizerConfig;
use crate::error::{Result, SearchError};
use crate::http;

/// Zero-width and invisible formatting characters stripped from converted text.
const INVISIBLE_CHARS: &[char] = &[
    '\u{00AD}', // soft hyphen
    '\u{180E}', // mongolian vowel separator
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{200E}', // left-to-right mark
    '\u{200F}', // right-to-left mark
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', // bidi embeddings
    '\u{2060}', // word joiner
    '\u{2061}', '\u{2062}', '\u{2063}', '\u{2064}', // invisible operators
    '\u{FEFF}', // byte order mark
];

/// Remove zero-width/invisible characters and non-whitespace control
/// characters from `text`.
pub fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect()
}

/// Largest acceptable converted length for an input of `input_chars` chars.
///
/// Script conversion maps characters roughly one to one, so anything far
/// longer than the input is not a conversion of it.
fn max_converted_chars(input_chars: usize) -> usize {
    input_chars.saturating_mul(2).saturating_add(16)
}

/// Client for the remote text-conversion service.
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    client: reqwest::Client,
    config: NormalizerConfig,
}

impl QueryNormalizer {
    /// Create a normalizer that shares `client` with the rest of the crate.
    pub fn new(client: reqwest::Client, config: NormalizerConfig) -> Self {
        Self { client, config }
    }

    /// Normalize `text` for dispatch.
    ///
    /// - Blank input returns `""` without any network call.
    /// - On success returns the converted text, stripped of invisible
    ///   characters and trimmed.
    /// - On any failure, or if conversion produced nothing usable, returns
    ///   the trimmed input.
    pub async fn normalize(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        if !self.config.enabled {
            return trimmed.to_owned();
        }

        tracing::trace!(query = trimmed, "normalizing query");
        match self.convert(trimmed).await {
            Ok(converted) => {
                tracing::trace!(query = %converted, "query normalized");
                converted
            }
            Err(err) => {
                tracing::warn!(
                    code = err.code(),
                    error = %err,
                    "query normalization degraded, using original text"
                );
                trimmed.to_owned()
            }
        }
    }

    /// Call the conversion service and validate its answer.
    async fn convert(&self, trimmed: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.config.endpoint,
            &[("converter", self.config.converter.as_str()), ("text", trimmed)],
        )
        .map_err(|e| SearchError::NormalizationDegraded(format!("invalid endpoint: {e}")))?;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let body = http::fetch_with_timeout(self.client.get(url), timeout).await?;

        let payload: Value = serde_json::from_slice(&body)
            .map_err(|e| SearchError::NormalizationDegraded(format!("malformed JSON: {e}")))?;
        let converted = extract_converted_text(&payload)?;

        let cleaned = strip_invisible(converted);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(SearchError::NormalizationDegraded(
                "converted text is empty".into(),
            ));
        }
        if cleaned.chars().count() > max_converted_chars(trimmed.chars().count()) {
            return Err(SearchError::NormalizationDegraded(
                "converted text is implausibly long".into(),
            ));
        }
        Ok(cleaned.to_owned())
    }
}

/// Pull `data.text` out of a `{ "code": 0, "data": { "text": ... } }` payload.
fn extract_converted_text(payload: &Value) -> Result<&str> {
    match payload.get("code").and_then(Value::as_i64) {
        Some(0) => {}
        Some(code) => {
            return Err(SearchError::NormalizationDegraded(format!(
                "service returned code {code}"
            )));
        }
        None => {
            return Err(SearchError::NormalizationDegraded(
                "response has no numeric code".into(),
            ));
        }
    }
    payload
        .get("data")
        .and_then(|data| data.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| SearchError::NormalizationDegraded("response has no data.text".into()))
}
