use std::sync::Arc;

use crate::config::Config;
use crate::domain::{FetchUnit, SourceKind};
use crate::http::HttpClient;
use crate::services::rate_limit::RateLimiter;
use crate::sources::traits::SourceAdapter;
use crate::sources::{CategoryApiAdapter, FeedAdapter, WebpageAdapter};

/// Adapters kept in priority order (category API, feeds, webpage).
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register every adapter the config enables.
    pub fn from_config(
        config: &Config,
        client: Arc<dyn HttpClient>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let mut registry = Self::new();

        for kind in config.enabled_sources() {
            let adapter: Arc<dyn SourceAdapter> = match kind {
                SourceKind::CategoryApi => Arc::new(CategoryApiAdapter::new(
                    client.clone(),
                    config.category_api_base_url.clone(),
                    config.categories.clone(),
                )),
                SourceKind::Feed => Arc::new(FeedAdapter::new(client.clone(), config.feeds.clone())),
                SourceKind::Webpage => Arc::new(
                    WebpageAdapter::new(
                        client.clone(),
                        limiter.clone(),
                        config.webpage_target_url.clone(),
                    )
                    .with_link_patterns(config.webpage_link_patterns.clone()),
                ),
            };
            registry.register(adapter);
        }

        registry
    }

    /// Add an adapter, replacing any already registered for the same kind.
    pub fn register(&mut self, source: Arc<dyn SourceAdapter>) {
        let kind = source.kind();
        self.sources.retain(|s| s.kind() != kind);

        let pos = self
            .sources
            .iter()
            .position(|s| s.kind().priority() > kind.priority())
            .unwrap_or(self.sources.len());
        self.sources.insert(pos, source);
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Units for the requested kinds paired with their adapter, in adapter
    /// priority order and, within one adapter, in the adapter's own order.
    pub fn plan(
        &self,
        kinds: &[SourceKind],
        per_source_limit: usize,
    ) -> Vec<(Arc<dyn SourceAdapter>, FetchUnit)> {
        self.sources
            .iter()
            .filter(|s| kinds.contains(&s.kind()))
            .flat_map(|s| {
                s.plan(per_source_limit)
                    .into_iter()
                    .map(move |unit| (s.clone(), unit))
            })
            .collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
