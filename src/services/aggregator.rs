use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::domain::{Article, FetchResult};
use crate::images::ImageResolver;

/// Merges per-unit results into the final ranked article list.
pub struct Aggregator {
    resolver: Option<Arc<ImageResolver>>,
    concurrency: usize,
}

impl Aggregator {
    pub fn new(resolver: Arc<ImageResolver>, concurrency: usize) -> Self {
        Self {
            resolver: Some(resolver),
            concurrency: concurrency.max(1),
        }
    }

    /// Merge, rank and truncate only; no page fetches.
    pub fn without_enrichment() -> Self {
        Self {
            resolver: None,
            concurrency: 1,
        }
    }

    /// Merge in source priority order, drop repeated URLs (first wins), sort
    /// newest first, truncate to `target_count`, then look up images for the
    /// survivors that still lack one.
    pub async fn aggregate(&self, results: Vec<FetchResult>, target_count: usize) -> Vec<Article> {
        let mut articles = rank(merge(results));
        articles.truncate(target_count);

        if let Some(resolver) = &self.resolver {
            self.enrich(resolver, &mut articles).await;
        }

        articles
    }

    async fn enrich(&self, resolver: &ImageResolver, articles: &mut [Article]) {
        let missing = articles.iter().filter(|a| !a.has_image()).count();
        if missing == 0 {
            return;
        }

        let found: Vec<(usize, Option<String>)> = stream::iter(
            articles
                .iter()
                .enumerate()
                .filter(|(_, a)| !a.has_image())
                .map(|(i, article)| async move { (i, resolver.resolve_fallback(article).await) }),
        )
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut resolved = 0;
        for (i, image) in found {
            if let Some(image) = image {
                articles[i].image = Some(image);
                resolved += 1;
            }
        }

        info!(missing, resolved, "image fallback finished");
    }
}

/// Concatenate batches in source priority order and keep the first article
/// seen for each URL.
pub fn merge(mut results: Vec<FetchResult>) -> Vec<Article> {
    // stable, so units of one source keep their planned order
    results.sort_by_key(|r| r.source.priority());

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    let mut duplicates = 0;

    for article in results.into_iter().flat_map(|r| r.articles) {
        if seen.insert(article.url.clone()) {
            merged.push(article);
        } else {
            duplicates += 1;
        }
    }

    debug!(unique = merged.len(), duplicates, "merged source batches");
    merged
}

/// Newest first; undated articles after every dated one, in input order.
pub fn rank(mut articles: Vec<Article>) -> Vec<Article> {
    articles.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Batch, FetchUnit, SourceKind};
    use crate::errors::FetchError;
    use crate::http::MockHttpClient;
    use crate::services::rate_limit::RateLimiter;
    use chrono::{TimeZone, Utc};

    fn article(url: &str, title: &str, hour: Option<u32>) -> Article {
        Article::new(url, title, "example.com")
            .unwrap()
            .with_published(hour.map(|h| Utc.with_ymd_and_hms(2025, 1, 13, h, 0, 0).unwrap()))
    }

    fn result(source: SourceKind, articles: Vec<Article>) -> FetchResult {
        let unit = FetchUnit::new(source, "unit", 10);
        FetchResult::success(&unit, Batch::new(articles, 0), 1)
    }

    #[test]
    fn test_merge_prefers_higher_priority_source() {
        let feed = result(
            SourceKind::Feed,
            vec![article("https://a.com/1", "Feed version", Some(9))],
        );
        let api = result(
            SourceKind::CategoryApi,
            vec![article("https://a.com/1", "API version", Some(9))],
        );

        let merged = merge(vec![feed, api]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "API version");
    }

    #[test]
    fn test_merge_ignores_failed_units() {
        let failed = FetchResult::failure(
            &FetchUnit::new(SourceKind::Webpage, "https://medium.com/tag/trending", 3),
            FetchError::Status(500),
            3,
        );
        let ok = result(SourceKind::Feed, vec![article("https://a.com/1", "One", None)]);

        assert_eq!(merge(vec![failed, ok]).len(), 1);
    }

    #[test]
    fn test_rank_dated_first_undated_stable() {
        let ranked = rank(vec![
            article("https://a.com/u1", "Undated one", None),
            article("https://a.com/old", "Old", Some(8)),
            article("https://a.com/u2", "Undated two", None),
            article("https://a.com/new", "New", Some(12)),
        ]);

        let urls: Vec<_> = ranked.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://a.com/new",
                "https://a.com/old",
                "https://a.com/u1",
                "https://a.com/u2"
            ]
        );
    }

    #[tokio::test]
    async fn test_truncate_never_pads() {
        let aggregator = Aggregator::without_enrichment();
        let input = vec![result(
            SourceKind::Feed,
            vec![
                article("https://a.com/1", "One", Some(1)),
                article("https://a.com/2", "Two", Some(2)),
                article("https://a.com/3", "Three", Some(3)),
            ],
        )];

        assert_eq!(aggregator.aggregate(input.clone(), 2).await.len(), 2);
        assert_eq!(aggregator.aggregate(input, 10).await.len(), 3);
    }

    #[tokio::test]
    async fn test_enrichment_only_fetches_imageless_survivors() {
        let mut client = MockHttpClient::new();
        client
            .expect_get()
            .times(1)
            .returning(|_, _| {
                Ok(r#"<meta property="og:image" content="https://cdn.techcrunch.com/og.jpg">"#.to_string())
            });

        let resolver = ImageResolver::new(
            Arc::new(client),
            Arc::new(RateLimiter::unlimited()),
            vec!["techcrunch.com".to_string()],
        );
        let aggregator = Aggregator::new(Arc::new(resolver), 4);

        let with_image = article("https://techcrunch.com/a", "Has image", Some(10))
            .with_image(Some("https://cdn.techcrunch.com/a.jpg".to_string()));
        let needs_image = article("https://techcrunch.com/b", "Needs image", Some(9));
        let truncated_away = article("https://techcrunch.com/c", "Too old", Some(1));

        let output = aggregator
            .aggregate(
                vec![result(SourceKind::Feed, vec![truncated_away, needs_image, with_image])],
                2,
            )
            .await;

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].image.as_deref(), Some("https://cdn.techcrunch.com/a.jpg"));
        assert_eq!(output[1].image.as_deref(), Some("https://cdn.techcrunch.com/og.jpg"));
    }
}
