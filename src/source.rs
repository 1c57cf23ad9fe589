//! Single-source search: request construction, retry, response validation.
//!
//! [`SourceSearchClient::search`] is infallible by construction. Whatever
//! goes wrong (transport, timeout, bad status, bad JSON) comes back as a
//! [`SourceOutcome`] with an `error`, so one source can never take down a
//! whole aggregation.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use serde_json::Value;
use url::Url;

use crate::config::AggregatorConfig;
use crate::error::{Result, SearchError};
use crate::http;
use crate::retry::{self, RetryPolicy};
use crate::types::{ContentItem, SourceDescriptor, SourceOutcome};

/// Something that can search one source and always produce an outcome.
///
/// [`crate::SearchAggregator`] is generic over this trait so the fan-out can
/// be exercised without a network. Implementations must be `Send + Sync`;
/// one instance is shared by every concurrent source task.
pub trait SourceSearch: Send + Sync {
    /// Search `source` for `query` at `page` (1-based).
    ///
    /// Must not panic on remote failures: errors belong in the outcome's
    /// `error` field, and `outcome.source` must equal `source.id`.
    fn search(
        &self,
        query: &str,
        source: &SourceDescriptor,
        page: u32,
    ) -> impl Future<Output = SourceOutcome> + Send;
}

/// HTTP implementation of [`SourceSearch`] for JSON list endpoints.
///
/// Issues `GET {base_url}{search_path}?ac=detail&wd={query}&pg={page}` and
/// expects a JSON object with a `list` array.
#[derive(Debug, Clone)]
pub struct SourceSearchClient {
    client: reqwest::Client,
    default_headers: HeaderMap,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SourceSearchClient {
    /// Create a client from aggregator settings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the default headers are invalid.
    pub fn new(client: reqwest::Client, config: &AggregatorConfig) -> Result<Self> {
        Ok(Self {
            client,
            default_headers: http::default_headers(config)?,
            timeout: Duration::from_millis(config.source_timeout_ms),
            retry: RetryPolicy::from(&config.retry),
        })
    }

    /// Fetch, retry and parse. Errors are returned for [`Self::search`] to
    /// convert.
    async fn fetch_items(
        &self,
        query: &str,
        source: &SourceDescriptor,
        page: u32,
    ) -> Result<Vec<ContentItem>> {
        let url = build_search_url(source, query, page)?;
        let headers = http::merge_headers(&self.default_headers, &source.headers)?;

        let body = retry::with_retry(&self.retry, &source.id, |_| {
            let request = self.client.get(url.clone()).headers(headers.clone());
            http::fetch_with_timeout(request, self.timeout)
        })
        .await?;

        parse_search_response(&body, &source.id)
    }
}

impl SourceSearch for SourceSearchClient {
    async fn search(&self, query: &str, source: &SourceDescriptor, page: u32) -> SourceOutcome {
        if query.trim().is_empty() {
            return SourceOutcome::empty(source.id.as_str());
        }
        let page = page.max(1);

        let started = Instant::now();
        match self.fetch_items(query, source, page).await {
            Ok(items) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(
                    source = %source.id,
                    count = items.len(),
                    elapsed_ms,
                    "source returned results"
                );
                SourceOutcome::success(source.id.as_str(), items, elapsed_ms)
            }
            Err(err) => {
                tracing::warn!(
                    source = %source.id,
                    code = err.code(),
                    error = %err,
                    "source search failed"
                );
                SourceOutcome::failure(
                    source.id.as_str(),
                    format!("failed to fetch results from {}: {err}", source.name),
                )
            }
        }
    }
}

/// Build the search URL for `source`.
///
/// Parameters are appended after any query string already present in
/// `search_path`.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `base_url + search_path` is not a URL.
pub fn build_search_url(source: &SourceDescriptor, query: &str, page: u32) -> Result<Url> {
    let mut url = Url::parse(&source.endpoint()).map_err(|e| {
        SearchError::Config(format!("invalid URL for source {}: {e}", source.id))
    })?;
    url.query_pairs_mut()
        .append_pair("ac", "detail")
        .append_pair("wd", query)
        .append_pair("pg", &page.to_string());
    Ok(url)
}

/// Parse a source's JSON body into tagged content items.
///
/// - The body must be a JSON object.
/// - A numeric `code` other than `0` or `1` is a protocol error; `msg` is
///   used as the message when present.
/// - A missing, `null` or non-array `list` means no results.
/// - Non-object list entries are skipped.
pub fn parse_search_response(body: &[u8], source_id: &str) -> Result<Vec<ContentItem>> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| SearchError::Protocol(format!("malformed JSON: {e}")))?;
    let Value::Object(mut payload) = payload else {
        return Err(SearchError::Protocol("expected a JSON object".into()));
    };

    match payload.get("code") {
        None | Some(Value::Null) => {}
        Some(code) => match code.as_i64() {
            Some(0 | 1) => {}
            _ => {
                let message = payload
                    .get("msg")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("unexpected response code {code}"));
                return Err(SearchError::Protocol(message));
            }
        },
    }

    let entries = match payload.remove("list") {
        Some(Value::Array(entries)) => entries,
        _ => return Ok(Vec::new()),
    };
    let total = entries.len();
    let items: Vec<ContentItem> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(fields) => Some(ContentItem::from_object(fields, source_id)),
            _ => None,
        })
        .collect();
    if items.len() < total {
        tracing::debug!(
            source = source_id,
            skipped = total - items.len(),
            "skipped non-object list entries"
        );
    }
    Ok(items)
}
