use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::domain::{Article, FetchResult, FetchUnit, SourceKind};
use crate::errors::ErrorKind;
use crate::services::aggregator::Aggregator;
use crate::services::rate_limit::RateLimiter;
use crate::services::retry::RetryPolicy;
use crate::sources::{SourceAdapter, SourceRegistry};

/// Failed units of one source, split by error kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCount {
    pub transient: usize,
    pub permanent: usize,
}

impl FailureCount {
    pub fn total(&self) -> usize {
        self.transient + self.permanent
    }
}

/// Per-source failure tally for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSummary {
    pub by_source: BTreeMap<SourceKind, FailureCount>,
}

impl FailureSummary {
    pub fn from_results(results: &[FetchResult]) -> Self {
        let mut by_source: BTreeMap<SourceKind, FailureCount> = BTreeMap::new();
        for result in results {
            if let Some(error) = &result.error {
                let count = by_source.entry(result.source).or_default();
                match error.kind() {
                    ErrorKind::Transient => count.transient += 1,
                    ErrorKind::Permanent => count.permanent += 1,
                }
            }
        }
        Self { by_source }
    }

    pub fn total(&self) -> usize {
        self.by_source.values().map(FailureCount::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, source: SourceKind) -> FailureCount {
        self.by_source.get(&source).copied().unwrap_or_default()
    }
}

impl fmt::Display for FailureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no failures");
        }
        let parts: Vec<String> = self
            .by_source
            .iter()
            .map(|(source, count)| {
                format!(
                    "{}: {} ({} transient, {} permanent)",
                    source,
                    count.total(),
                    count.transient,
                    count.permanent
                )
            })
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Articles plus what went wrong getting them.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub articles: Vec<Article>,
    pub failures: FailureSummary,
    pub units: usize,
}

/// Runs every planned unit under the shared rate limiter and retry policy,
/// then hands the joined results to the aggregator.
pub struct Orchestrator {
    registry: SourceRegistry,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    workers: usize,
    aggregator: Aggregator,
}

impl Orchestrator {
    pub fn new(
        registry: SourceRegistry,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        workers: usize,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            registry,
            limiter,
            retry,
            workers: workers.max(1),
            aggregator,
        }
    }

    /// Fetch every unit of `sources`. One result per unit, failures included,
    /// in plan order.
    pub async fn collect(&self, sources: &[SourceKind], per_source_limit: usize) -> Vec<FetchResult> {
        let plan = self.registry.plan(sources, per_source_limit);
        info!(units = plan.len(), workers = self.workers, "starting fetch");

        stream::iter(
            plan.into_iter()
                .map(|(adapter, unit)| async move { self.fetch_unit(adapter.as_ref(), unit).await }),
        )
        .buffered(self.workers)
        .collect()
        .await
    }

    async fn fetch_unit(&self, adapter: &dyn SourceAdapter, unit: FetchUnit) -> FetchResult {
        let class = unit.source.upstream_class();
        let unit_ref = &unit;

        let (outcome, attempts) = self
            .retry
            .run(|attempt| async move {
                self.limiter.acquire(class).await;
                debug!(source = %unit_ref.source, unit = %unit_ref.target, attempt, "fetching unit");
                adapter.fetch_unit(unit_ref).await
            })
            .await;

        match outcome {
            Ok(batch) => {
                debug!(
                    source = %unit.source,
                    unit = %unit.target,
                    count = batch.articles.len(),
                    skipped = batch.skipped,
                    attempts,
                    "unit complete"
                );
                FetchResult::success(&unit, batch, attempts)
            }
            Err(error) => {
                warn!(
                    source = %unit.source,
                    unit = %unit.target,
                    attempts,
                    kind = %error.kind(),
                    error = %error,
                    "unit abandoned"
                );
                FetchResult::failure(&unit, error, attempts)
            }
        }
    }

    /// Best-effort article list for `sources`. Never fails; if every source
    /// fails the list is empty.
    pub async fn run(
        &self,
        sources: &[SourceKind],
        per_source_limit: usize,
        target_count: usize,
    ) -> Vec<Article> {
        self.run_with_report(sources, per_source_limit, target_count)
            .await
            .articles
    }

    pub async fn run_with_report(
        &self,
        sources: &[SourceKind],
        per_source_limit: usize,
        target_count: usize,
    ) -> RunOutcome {
        let results = self.collect(sources, per_source_limit).await;
        let units = results.len();

        let failures = FailureSummary::from_results(&results);
        if failures.is_empty() {
            info!(units, "all units fetched");
        } else {
            warn!(units, failed = failures.total(), summary = %failures, "some units failed");
        }

        let articles = self.aggregator.aggregate(results, target_count).await;
        info!(count = articles.len(), target = target_count, "aggregation complete");

        RunOutcome {
            articles,
            failures,
            units,
        }
    }
}
