use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::domain::{host_of, Article, Batch, FetchUnit, SourceKind, UpstreamClass};
use crate::errors::FetchError;
use crate::http::{HeaderProfile, HttpClient};
use crate::images::extract;
use crate::services::rate_limit::RateLimiter;
use crate::sources::html::collapse_whitespace;
use crate::sources::traits::SourceAdapter;

/// Path fragments that mark a listing link as an article.
pub const DEFAULT_LINK_PATTERNS: &[&str] = &["/p/", "/@"];

const MIN_TITLE_CHARS: usize = 10;

/// Cards read past `limit` to stand in for detail pages that fail.
const SPARE_CARDS: usize = 3;

const TRENDING_TAG: &str = "trending";

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));
static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").expect("valid selector"));
static TIME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time[datetime]").expect("valid selector"));
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article, main").expect("valid selector"));

/// One article link found on the listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCard {
    pub url: String,
    pub title: String,
    pub image: Option<String>,
}

/// Fields read from an article's own page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content_image: Option<String>,
    pub meta_image: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

pub struct WebpageAdapter {
    client: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiter>,
    target_url: String,
    link_patterns: Vec<String>,
}

impl WebpageAdapter {
    pub fn new(client: Arc<dyn HttpClient>, limiter: Arc<RateLimiter>, target_url: impl Into<String>) -> Self {
        Self {
            client,
            limiter,
            target_url: target_url.into(),
            link_patterns: DEFAULT_LINK_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_link_patterns(mut self, patterns: Vec<String>) -> Self {
        self.link_patterns = patterns;
        self
    }

    /// Scrape the listing at `target_url`, then visit article pages until
    /// `limit` articles are built.
    ///
    /// A detail page that cannot be fetched is skipped and counted; a spare
    /// card from the listing takes its place.
    pub async fn fetch(&self, target_url: &str, limit: usize) -> Result<Batch, FetchError> {
        let base = Url::parse(target_url).map_err(|_| FetchError::InvalidUrl(target_url.to_string()))?;
        let source = host_of(target_url).unwrap_or_else(|| target_url.to_string());

        let listing = self.client.get(target_url, HeaderProfile::Standard).await?;
        let cards = parse_listing(&listing, &base, &self.link_patterns, limit + SPARE_CARDS);
        debug!(target = %target_url, cards = cards.len(), "parsed listing page");

        let mut articles = Vec::with_capacity(limit);
        let mut skipped = 0;

        for card in cards {
            if articles.len() >= limit {
                break;
            }
            self.limiter.acquire(UpstreamClass::Webpage).await;

            let detail = match self.client.get(&card.url, HeaderProfile::Standard).await {
                Ok(html) => parse_detail(&html),
                Err(e) => {
                    debug!(url = %card.url, error = %e, "skipping article page");
                    skipped += 1;
                    continue;
                }
            };

            match build_article(card, detail, &source) {
                Some(article) => articles.push(article),
                None => skipped += 1,
            }
        }

        info!(target = %target_url, count = articles.len(), skipped, "scraped webpage articles");
        Ok(Batch::new(articles, skipped))
    }
}

#[async_trait]
impl SourceAdapter for WebpageAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Webpage
    }

    fn plan(&self, per_source_limit: usize) -> Vec<FetchUnit> {
        vec![FetchUnit::new(
            SourceKind::Webpage,
            self.target_url.clone(),
            per_source_limit,
        )]
    }

    async fn fetch_unit(&self, unit: &FetchUnit) -> Result<Batch, FetchError> {
        self.fetch(&unit.target, unit.limit).await
    }
}

fn build_article(card: ListingCard, detail: DetailPage, source: &str) -> Option<Article> {
    let title = detail.title.unwrap_or(card.title);
    let image = detail.content_image.or(card.image).or(detail.meta_image);

    Article::new(&card.url, &title, source).map(|article| {
        article
            .with_published(detail.published)
            .with_summary(detail.summary)
            .with_tags([TRENDING_TAG])
            .with_image(image)
    })
}

/// Article links on a listing page, in document order.
///
/// Links qualify when their path contains one of `patterns` and they stay on
/// the listing's host. Query strings and fragments are dropped so tracking
/// parameters don't defeat deduplication.
pub fn parse_listing(html: &str, base: &Url, patterns: &[String], limit: usize) -> Vec<ListingCard> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut cards = Vec::new();

    for link in document.select(&LINK) {
        if cards.len() >= limit {
            break;
        }
        let Some(url) = link
            .value()
            .attr("href")
            .and_then(|href| article_url(href, base, patterns))
        else {
            continue;
        };

        let title = collapse_whitespace(&link.text().collect::<String>());
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }

        if !seen.insert(url.clone()) {
            continue;
        }

        let image = extract::image_near(link, |other| {
            other
                .value()
                .attr("href")
                .and_then(|href| article_url(href, base, patterns))
                .is_some_and(|other_url| other_url != url)
        });

        cards.push(ListingCard { url, title, image });
    }

    cards
}

/// Canonical article URL for a listing `href`, if it qualifies.
fn article_url(href: &str, base: &Url, patterns: &[String]) -> Option<String> {
    if !patterns.iter().any(|p| href.contains(p.as_str())) {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if url.host_str() != base.host_str() {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Title, summary, images and publication time from an article page.
pub fn parse_detail(html: &str) -> DetailPage {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "og:title").or_else(|| {
        document
            .select(&H1)
            .map(|h| collapse_whitespace(&h.text().collect::<String>()))
            .find(|t| !t.is_empty())
    });

    let summary =
        meta_content(&document, "og:description").or_else(|| meta_content(&document, "description"));

    let content_image = document.select(&CONTENT).find_map(extract::image_in_container);

    let published = meta_content(&document, "article:published_time")
        .or_else(|| {
            document
                .select(&TIME)
                .find_map(|t| t.value().attr("datetime").map(str::to_string))
        })
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));

    DetailPage {
        title,
        summary,
        content_image,
        meta_image: extract::meta_image(&document),
        published,
    }
}

/// Non-empty `content` of a `<meta>` matched by `property` or `name`.
fn meta_content(document: &Html, key: &str) -> Option<String> {
    document.select(&META).find_map(|meta| {
        let element = meta.value();
        let matches = element
            .attr("property")
            .or_else(|| element.attr("name"))
            .is_some_and(|k| k.eq_ignore_ascii_case(key));
        if !matches {
            return None;
        }
        element
            .attr("content")
            .map(collapse_whitespace)
            .filter(|c| !c.is_empty())
    })
}
