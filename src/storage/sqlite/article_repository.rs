use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use crate::domain::Article;
use crate::errors::{ScraperError, ScraperResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{ArticleRepository, PurgeReport};

const PURGE_SAMPLE_SIZE: usize = 5;

const COLUMNS: &str =
    "url, title, published_at, summary, source, tags, image, original_source, external_id, scraped_at";

/// Stable row id: the first 16 hex digits of the URL's SHA-256 followed by
/// the scrape date.
pub fn article_id(article: &Article) -> String {
    let digest = format!("{:x}", Sha256::digest(article.url.as_bytes()));
    format!("{}_{}", &digest[..16], article.scraped_at.format("%Y%m%d"))
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, raw: &str) -> ScraperResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScraperError::InvalidInput(format!("bad {} '{}': {}", column, raw, e)))
}

/// Raw column values; converted to an [`Article`] outside the row callback.
struct ArticleRow {
    url: String,
    title: String,
    published_at: Option<String>,
    summary: Option<String>,
    source: String,
    tags: String,
    image: Option<String>,
    original_source: Option<String>,
    external_id: Option<String>,
    scraped_at: String,
}

impl ArticleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            title: row.get(1)?,
            published_at: row.get(2)?,
            summary: row.get(3)?,
            source: row.get(4)?,
            tags: row.get(5)?,
            image: row.get(6)?,
            original_source: row.get(7)?,
            external_id: row.get(8)?,
            scraped_at: row.get(9)?,
        })
    }

    fn into_article(self) -> ScraperResult<Article> {
        Ok(Article {
            published_at: self
                .published_at
                .as_deref()
                .map(|raw| parse_timestamp("published_at", raw))
                .transpose()?,
            scraped_at: parse_timestamp("scraped_at", &self.scraped_at)?,
            tags: serde_json::from_str(&self.tags)?,
            url: self.url,
            title: self.title,
            summary: self.summary,
            source: self.source,
            image: self.image,
            original_source: self.original_source,
            external_id: self.external_id,
        })
    }
}

#[derive(Clone)]
pub struct SqliteArticleRepository {
    storage: SqliteStorage,
}

impl SqliteArticleRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    fn select(&self, sql: &str, params: impl rusqlite::Params) -> ScraperResult<Vec<Article>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ArticleRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ArticleRow::into_article).collect()
    }
}

impl ArticleRepository for SqliteArticleRepository {
    fn upsert_articles(&self, articles: &[Article]) -> ScraperResult<usize> {
        let mut conn = self.storage.connection()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for article in articles {
            let existing: Option<String> = tx
                .query_row("SELECT id FROM articles WHERE url = ?1", [&article.url], |row| row.get(0))
                .optional()?;

            let tags = serde_json::to_string(&article.tags)?;
            let published_at = article.published_at.as_ref().map(timestamp);

            if existing.is_some() {
                // id and scraped_at belong to the first sighting
                tx.execute(
                    "UPDATE articles SET title = ?2, published_at = ?3, summary = ?4, source = ?5,
                        tags = ?6, image = COALESCE(?7, image), original_source = ?8,
                        external_id = ?9, updated_at = datetime('now')
                     WHERE url = ?1",
                    params![
                        article.url,
                        article.title,
                        published_at,
                        article.summary,
                        article.source,
                        tags,
                        article.image,
                        article.original_source,
                        article.external_id,
                    ],
                )?;
            } else {
                tx.execute(
                    &format!("INSERT INTO articles (id, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)", COLUMNS),
                    params![
                        article_id(article),
                        article.url,
                        article.title,
                        published_at,
                        article.summary,
                        article.source,
                        tags,
                        article.image,
                        article.original_source,
                        article.external_id,
                        timestamp(&article.scraped_at),
                    ],
                )?;
                inserted += 1;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn query_recent(&self, since: DateTime<Utc>, limit: usize) -> ScraperResult<Vec<Article>> {
        self.select(
            &format!(
                "SELECT {} FROM articles WHERE scraped_at >= ?1 ORDER BY scraped_at DESC LIMIT ?2",
                COLUMNS
            ),
            params![timestamp(&since), limit as i64],
        )
    }

    fn count(&self) -> ScraperResult<usize> {
        let conn = self.storage.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn count_since(&self, since: DateTime<Utc>) -> ScraperResult<usize> {
        let conn = self.storage.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM articles WHERE scraped_at >= ?1",
            [timestamp(&since)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> ScraperResult<PurgeReport> {
        let cutoff = timestamp(&cutoff);

        let matched = {
            let conn = self.storage.connection()?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM articles WHERE scraped_at < ?1",
                [&cutoff],
                |row| row.get(0),
            )?;
            count as usize
        };

        let sample = self.select(
            &format!(
                "SELECT {} FROM articles WHERE scraped_at < ?1 ORDER BY scraped_at ASC LIMIT ?2",
                COLUMNS
            ),
            params![cutoff, PURGE_SAMPLE_SIZE as i64],
        )?;

        let deleted = if dry_run || matched == 0 {
            0
        } else {
            let conn = self.storage.connection()?;
            conn.execute("DELETE FROM articles WHERE scraped_at < ?1", [&cutoff])?
        };

        Ok(PurgeReport {
            matched,
            deleted,
            sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn setup() -> SqliteArticleRepository {
        SqliteArticleRepository::new(SqliteStorage::in_memory().unwrap())
    }

    fn article(url: &str, scraped_days_ago: i64) -> Article {
        let mut article = Article::new(url, "Stored headline", "example.com")
            .unwrap()
            .with_tags(["world", "politics"])
            .with_published(Some(Utc.with_ymd_and_hms(2025, 1, 13, 12, 0, 0).unwrap()));
        article.scraped_at = Utc::now() - Duration::days(scraped_days_ago);
        article
    }

    #[test]
    fn test_article_id_shape() {
        let mut article = article("https://example.com/a", 0);
        article.scraped_at = Utc.with_ymd_and_hms(2025, 1, 13, 8, 0, 0).unwrap();

        let id = article_id(&article);
        let (hash, date) = id.split_once('_').unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(date, "20250113");
        assert_eq!(id, article_id(&article));
    }

    #[test]
    fn test_upsert_counts_only_new_rows() {
        let repo = setup();

        let first = vec![article("https://example.com/a", 0), article("https://example.com/b", 0)];
        assert_eq!(repo.upsert_articles(&first).unwrap(), 2);

        let mut changed = article("https://example.com/a", 0);
        changed.title = "Updated headline".to_string();
        let second = vec![changed, article("https://example.com/c", 0)];
        assert_eq!(repo.upsert_articles(&second).unwrap(), 1);

        assert_eq!(repo.count().unwrap(), 3);

        let stored = repo
            .query_recent(Utc::now() - Duration::days(1), 10)
            .unwrap();
        let updated = stored.iter().find(|a| a.url == "https://example.com/a").unwrap();
        assert_eq!(updated.title, "Updated headline");
        assert_eq!(updated.tags, vec!["world", "politics"]);
        assert!(updated.published_at.is_some());
    }

    #[test]
    fn test_update_keeps_existing_image() {
        let repo = setup();

        let with_image = article("https://example.com/a", 0)
            .with_image(Some("https://cdn.example.com/a.jpg".to_string()));
        repo.upsert_articles(&[with_image]).unwrap();
        repo.upsert_articles(&[article("https://example.com/a", 0)]).unwrap();

        let stored = repo.query_recent(Utc::now() - Duration::days(1), 10).unwrap();
        assert_eq!(stored[0].image.as_deref(), Some("https://cdn.example.com/a.jpg"));
    }

    #[test]
    fn test_query_recent_window_and_order() {
        let repo = setup();
        repo.upsert_articles(&[
            article("https://example.com/old", 10),
            article("https://example.com/newer", 1),
            article("https://example.com/newest", 0),
        ])
        .unwrap();

        let recent = repo.query_recent(Utc::now() - Duration::days(7), 10).unwrap();
        let urls: Vec<_> = recent.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/newest", "https://example.com/newer"]);

        assert_eq!(repo.count_since(Utc::now() - Duration::days(7)).unwrap(), 2);
        assert_eq!(repo.query_recent(Utc::now() - Duration::days(30), 1).unwrap().len(), 1);
    }

    #[test]
    fn test_purge_dry_run_then_delete() {
        let repo = setup();
        repo.upsert_articles(&[
            article("https://example.com/ancient", 90),
            article("https://example.com/old", 70),
            article("https://example.com/fresh", 2),
        ])
        .unwrap();

        let cutoff = Utc::now() - Duration::days(60);

        let dry = repo.purge_older_than(cutoff, true).unwrap();
        assert_eq!(dry.matched, 2);
        assert_eq!(dry.deleted, 0);
        assert_eq!(dry.sample[0].url, "https://example.com/ancient");
        assert_eq!(repo.count().unwrap(), 3);

        let real = repo.purge_older_than(cutoff, false).unwrap();
        assert_eq!(real.deleted, 2);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_purge_nothing_to_do() {
        let repo = setup();
        let report = repo.purge_older_than(Utc::now(), false).unwrap();
        assert_eq!(report, PurgeReport::default());
    }
}
