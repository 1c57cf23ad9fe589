//! Fan-out/fan-in across sources.
//!
//! The query is normalized once, then every source is searched in its own
//! tokio task. All tasks are awaited; none is cancelled because a sibling
//! failed. If the caller drops the [`SearchAggregator::aggregate`] future,
//! the remaining tasks are aborted. The output has one [`SourceOutcome`]
//! per input source, in input order, whatever order the tasks finished in.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};

use crate::config::AggregatorConfig;
use crate::error::Result;
use crate::http;
use crate::normalize::QueryNormalizer;
use crate::source::{SourceSearch, SourceSearchClient};
use crate::types::{SourceDescriptor, SourceOutcome};

/// Multi-source search aggregator.
///
/// Cheap to share behind an `Arc`; [`Self::aggregate`] takes `&self` and
/// holds no state between calls.
///
/// # Examples
///
/// ```no_run
/// use multisource_search::{AggregatorConfig, SearchAggregator, SourceDescriptor};
///
/// # async fn example() -> multisource_search::Result<()> {
/// let aggregator = SearchAggregator::new(AggregatorConfig::default())?;
/// let sources = vec![SourceDescriptor::new(
///     "alpha",
///     "Alpha",
///     "https://alpha.example",
///     "/api.php/provide/vod",
/// )];
/// for outcome in aggregator.aggregate("流浪地球", &sources, 1).await {
///     match outcome.error {
///         Some(err) => eprintln!("{}: {err}", outcome.source),
///         None => println!("{}: {} results", outcome.source, outcome.results.len()),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct SearchAggregator<S = SourceSearchClient> {
    normalizer: QueryNormalizer,
    searcher: Arc<S>,
    limiter: Option<Arc<Semaphore>>,
}

impl SearchAggregator<SourceSearchClient> {
    /// Build an aggregator with the HTTP source client.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError::Config`] if `config` fails validation or
    /// the HTTP client cannot be built.
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        let client = http::build_client()?;
        let normalizer = QueryNormalizer::new(client.clone(), config.normalizer.clone());
        let searcher = SourceSearchClient::new(client, &config)?;
        Ok(Self::with_searcher(normalizer, searcher, config.max_concurrency))
    }
}

impl<S> SearchAggregator<S>
where
    S: SourceSearch + 'static,
{
    /// Build an aggregator around any [`SourceSearch`] implementation.
    ///
    /// `max_concurrency` caps in-flight source searches; `None` runs every
    /// source at once.
    pub fn with_searcher(
        normalizer: QueryNormalizer,
        searcher: S,
        max_concurrency: Option<usize>,
    ) -> Self {
        Self {
            normalizer,
            searcher: Arc::new(searcher),
            limiter: max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    /// Normalize `query` once and search every source with it.
    ///
    /// Never fails: `output.len() == sources.len()` and
    /// `output[i].source == sources[i].id`.
    pub async fn aggregate(
        &self,
        query: &str,
        sources: &[SourceDescriptor],
        page: u32,
    ) -> Vec<SourceOutcome> {
        let normalized = self.normalizer.normalize(query).await;
        self.dispatch(&normalized, sources, page).await
    }

    /// Search every source with an already-normalized query.
    pub async fn dispatch(
        &self,
        normalized_query: &str,
        sources: &[SourceDescriptor],
        page: u32,
    ) -> Vec<SourceOutcome> {
        let query: Arc<str> = Arc::from(normalized_query);

        let handles: Vec<_> = sources
            .iter()
            .cloned()
            .map(|source| {
                let searcher = Arc::clone(&self.searcher);
                let limiter = self.limiter.clone();
                let query = Arc::clone(&query);
                tokio::spawn(async move {
                    // A closed semaphore only means no limit is enforced.
                    let _permit = match limiter {
                        Some(limiter) => limiter.acquire_owned().await.ok(),
                        None => None,
                    };
                    searcher.search(&query, &source, page).await
                })
            })
            .collect();

        let _abort_guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());
        let joined = futures::future::join_all(handles).await;

        let outcomes: Vec<SourceOutcome> = joined
            .into_iter()
            .zip(sources)
            .map(|(joined, source)| match joined {
                Ok(outcome) => conform(outcome, source),
                Err(err) => {
                    let reason = describe_join_error(err);
                    tracing::error!(source = %source.id, reason = %reason, "search task failed");
                    SourceOutcome::failure(
                        source.id.as_str(),
                        format!("search task for {} failed: {reason}", source.id),
                    )
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.is_error()).count();
        tracing::debug!(
            sources = outcomes.len(),
            failed,
            results = outcomes.iter().map(|o| o.results.len()).sum::<usize>(),
            "aggregation complete"
        );
        outcomes
    }
}

/// Aborts the source tasks when dropped.
///
/// Dropped on return too, by which point every task has finished and the
/// aborts are no-ops.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Enforce the outcome invariants regardless of what the searcher returned.
fn conform(mut outcome: SourceOutcome, source: &SourceDescriptor) -> SourceOutcome {
    if outcome.source != source.id {
        outcome.source.clone_from(&source.id);
    }
    if outcome.error.is_some() {
        outcome.results.clear();
        outcome.response_time_ms = None;
    }
    outcome
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task was cancelled".to_owned();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned());
            match message {
                Some(message) => format!("task panicked: {message}"),
                None => "task panicked".to_owned(),
            }
        }
        Err(_) => "task failed".to_owned(),
    }
}
