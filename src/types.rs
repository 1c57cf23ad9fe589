//! Core types: source descriptors, content items, and per-source outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Static description of one remote search source.
///
/// Created when configuration is loaded and shared read-only by every
/// search task. Accepts both `base_url` and `baseUrl` spellings so the same
/// descriptor can come from TOML or from a JSON settings payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique, stable identifier. Copied into every item and outcome.
    pub id: String,
    /// Display label used in log lines and error messages.
    pub name: String,
    /// Scheme and host, e.g. `https://api.example.com`.
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    /// Path appended to `base_url`, e.g. `/api.php/provide/vod`.
    #[serde(alias = "searchPath")]
    pub search_path: String,
    /// Per-source header overrides. These win over the defaults.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl SourceDescriptor {
    /// Create a descriptor without header overrides.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        search_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            search_path: search_path.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a header override.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The full search endpoint: `base_url` followed by `search_path`.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.search_path)
    }
}

/// One search hit as returned by a source.
///
/// Every field the source sent is kept as-is in `fields`; the only field the
/// crate owns is `source`, which always names the originating source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Id of the source that returned this item.
    pub source: String,
    /// Pass-through fields from the source payload.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentItem {
    /// Wrap a raw JSON object, tagging it with `source_id`.
    ///
    /// A `source` key already present in the payload is replaced.
    pub fn from_object(mut fields: Map<String, Value>, source_id: &str) -> Self {
        fields.remove("source");
        Self {
            source: source_id.to_owned(),
            fields,
        }
    }

    /// Look up a pass-through field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// The result of querying one source. Exactly one exists per input source.
///
/// When `error` is set, `results` is empty and `response_time_ms` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOutcome {
    /// Items returned by the source, in the order the source sent them.
    pub results: Vec<ContentItem>,
    /// Id of the source this outcome belongs to.
    pub source: String,
    /// Milliseconds from request start to a parsed response.
    #[serde(
        rename = "responseTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time_ms: Option<u64>,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceOutcome {
    /// A completed request with its items and measured latency.
    pub fn success(source: impl Into<String>, results: Vec<ContentItem>, response_time_ms: u64) -> Self {
        Self {
            results,
            source: source.into(),
            response_time_ms: Some(response_time_ms),
            error: None,
        }
    }

    /// An outcome for a query that needed no request at all.
    pub fn empty(source: impl Into<String>) -> Self {
        Self::success(source, Vec::new(), 0)
    }

    /// A failed request. Results are always empty.
    pub fn failure(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            source: source.into(),
            response_time_ms: None,
            error: Some(error.into()),
        }
    }

    /// Returns `true` if this source failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
