use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::errors::{ScraperError, ScraperResult};
use crate::storage::traits::{ArticleRepository, PurgeReport};

/// Retention is counted in 30-day months.
const DAYS_PER_MONTH: i64 = 30;

pub struct RetentionCleaner<R: ArticleRepository> {
    repository: R,
}

impl<R: ArticleRepository> RetentionCleaner<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn cutoff(months: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(months) * DAYS_PER_MONTH)
    }

    /// Delete (or in a dry run, only count) articles scraped more than
    /// `months` months ago.
    pub fn cleanup(&self, months: u32, dry_run: bool) -> ScraperResult<PurgeReport> {
        if months == 0 {
            return Err(ScraperError::InvalidInput(
                "retention must be at least one month".to_string(),
            ));
        }

        let cutoff = Self::cutoff(months, Utc::now());
        let report = self.repository.purge_older_than(cutoff, dry_run)?;

        info!(
            months,
            dry_run,
            cutoff = %cutoff.format("%Y-%m-%d"),
            matched = report.matched,
            deleted = report.deleted,
            "retention cleanup finished"
        );

        Ok(report)
    }
}
