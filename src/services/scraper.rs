use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::domain::Article;
use crate::errors::ScraperResult;
use crate::http::{HttpClient, ReqwestClient};
use crate::images::ImageResolver;
use crate::services::aggregator::Aggregator;
use crate::services::orchestrator::{FailureSummary, Orchestrator};
use crate::services::rate_limit::RateLimiter;
use crate::services::retry::RetryPolicy;
use crate::sources::{CategoryApiAdapter, SourceRegistry};

/// One run's articles plus what it cost to get them.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub articles: Vec<Article>,
    pub failures: FailureSummary,
    /// Share of articles carrying an image, in percent.
    pub image_coverage: f64,
}

impl ScrapeReport {
    pub fn with_images(&self) -> usize {
        self.articles.iter().filter(|a| a.has_image()).count()
    }
}

/// Percentage of `articles` that carry an image; 0 for an empty list.
pub fn image_coverage(articles: &[Article]) -> f64 {
    if articles.is_empty() {
        return 0.0;
    }
    let with_images = articles.iter().filter(|a| a.has_image()).count();
    with_images as f64 * 100.0 / articles.len() as f64
}

/// The daily scrape: every enabled source, merged, ranked and enriched.
pub struct DailyScraper {
    config: Config,
    client: Arc<dyn HttpClient>,
    orchestrator: Orchestrator,
}

impl DailyScraper {
    pub fn new(config: Config) -> ScraperResult<Self> {
        let client = ReqwestClient::new(config.request_timeout)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    pub fn with_client(config: Config, client: Arc<dyn HttpClient>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_delay));
        let registry = SourceRegistry::from_config(&config, client.clone(), limiter.clone());
        let resolver = ImageResolver::new(
            client.clone(),
            limiter.clone(),
            config.trusted_image_domains.clone(),
        );
        let aggregator = Aggregator::new(Arc::new(resolver), config.worker_count);
        let retry = RetryPolicy::new(config.max_retries, config.rate_limit_delay);
        let orchestrator = Orchestrator::new(registry, limiter, retry, config.worker_count, aggregator);

        Self {
            config,
            client,
            orchestrator,
        }
    }

    pub async fn scrape_daily_articles(&self, target_count: usize) -> Vec<Article> {
        self.scrape_with_report(target_count).await.articles
    }

    pub async fn scrape_with_report(&self, target_count: usize) -> ScrapeReport {
        let sources = self.config.enabled_sources();
        info!(
            target = target_count,
            sources = ?sources,
            "starting daily scrape"
        );

        let outcome = self
            .orchestrator
            .run_with_report(&sources, self.config.feed_article_limit, target_count)
            .await;

        let image_coverage = image_coverage(&outcome.articles);
        info!(
            count = outcome.articles.len(),
            image_coverage = %format!("{:.1}%", image_coverage),
            failures = %outcome.failures,
            "daily scrape finished"
        );

        ScrapeReport {
            articles: outcome.articles,
            failures: outcome.failures,
            image_coverage,
        }
    }

    /// Trending topic names from the news API; empty on any failure.
    pub async fn trending_topics(&self) -> Vec<String> {
        let adapter = CategoryApiAdapter::new(
            self.client.clone(),
            self.config.category_api_base_url.clone(),
            self.config.categories.clone(),
        );
        adapter.trending_topics().await
    }
}
