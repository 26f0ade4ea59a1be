pub mod rate_limit;
pub mod retry;
pub mod aggregator;
pub mod orchestrator;
pub mod scraper;
pub mod cleanup;

pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use aggregator::Aggregator;
pub use orchestrator::{FailureCount, FailureSummary, Orchestrator, RunOutcome};
pub use scraper::{DailyScraper, ScrapeReport};
pub use cleanup::RetentionCleaner;
