use chrono::{DateTime, Utc};

use crate::domain::Article;
use crate::errors::ScraperResult;

/// Outcome of a retention purge. In a dry run nothing is deleted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurgeReport {
    pub matched: usize,
    pub deleted: usize,
    /// A few of the matched articles, oldest first.
    pub sample: Vec<Article>,
}

#[cfg_attr(test, mockall::automock)]
pub trait ArticleRepository: Send + Sync {
    /// Insert or update by URL. Returns how many articles were new.
    fn upsert_articles(&self, articles: &[Article]) -> ScraperResult<usize>;

    /// Articles scraped at or after `since`, newest first.
    fn query_recent(&self, since: DateTime<Utc>, limit: usize) -> ScraperResult<Vec<Article>>;

    fn count(&self) -> ScraperResult<usize>;

    fn count_since(&self, since: DateTime<Utc>) -> ScraperResult<usize>;

    /// Remove articles scraped before `cutoff`.
    fn purge_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> ScraperResult<PurgeReport>;
}
