//! # multisource-search
//!
//! Search many independent content sources at once and get exactly one
//! answer back per source, whether that source succeeded, timed out, or sent
//! garbage.
//!
//! ## Design
//!
//! - The query is normalized once (traditional → simplified Chinese) by a
//!   remote conversion service under a short timeout; on any failure the
//!   trimmed original text is used instead
//! - Each source is searched in its own tokio task with a per-attempt
//!   timeout and bounded retry on transient failures
//! - Failures are data, not errors: a failed source yields a
//!   [`SourceOutcome`] with an `error` message and no results
//! - Output order always matches input order
//!
//! ## Privacy
//!
//! - Query text is logged only at trace level
//! - Request URLs are stripped from transport error messages

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod retry;
pub mod source;
pub mod types;

pub use aggregator::SearchAggregator;
pub use catalog::SourceCatalog;
pub use config::{AggregatorConfig, NormalizerConfig, RetryConfig};
pub use error::{Result, SearchError};
pub use normalize::QueryNormalizer;
pub use source::{SourceSearch, SourceSearchClient};
pub use types::{ContentItem, SourceDescriptor, SourceOutcome};

/// Search `sources` for `query` with the default configuration.
///
/// Convenience wrapper around [`SearchAggregator::aggregate`]. Like that
/// method it never fails: if the aggregator itself cannot be built, every
/// source gets an outcome carrying that error.
///
/// # Examples
///
/// ```no_run
/// # async fn example() {
/// let sources = vec![multisource_search::SourceDescriptor::new(
///     "alpha",
///     "Alpha",
///     "https://alpha.example",
///     "/api.php/provide/vod",
/// )];
/// let outcomes = multisource_search::aggregate("三體", &sources, 1).await;
/// assert_eq!(outcomes.len(), sources.len());
/// # }
/// ```
pub async fn aggregate(query: &str, sources: &[SourceDescriptor], page: u32) -> Vec<SourceOutcome> {
    match SearchAggregator::new(AggregatorConfig::default()) {
        Ok(aggregator) => aggregator.aggregate(query, sources, page).await,
        Err(err) => {
            tracing::error!(error = %err, "failed to build search aggregator");
            sources
                .iter()
                .map(|source| {
                    SourceOutcome::failure(
                        source.id.as_str(),
                        format!("search aggregator unavailable: {err}"),
                    )
                })
                .collect()
        }
    }
}
