use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Article, Batch, FetchUnit, SourceKind};
use crate::errors::FetchError;
use crate::http::{HeaderProfile, HttpClient};
use crate::sources::html::collapse_whitespace;
use crate::sources::traits::SourceAdapter;

/// Fixed source identifier for every article from the news API.
pub const SOURCE_ID: &str = "inshorts.com";

const ARTICLE_URL_PREFIX: &str = "https://inshorts.com/en/news/";

/// One configured category: API key, item cap and priority (1 is highest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub key: String,
    pub max_items: usize,
    pub priority: u8,
}

impl CategoryConfig {
    pub fn new(key: impl Into<String>, max_items: usize, priority: u8) -> Self {
        Self {
            key: key.into(),
            max_items,
            priority,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewsEnvelope {
    data: NewsData,
}

#[derive(Debug, Deserialize)]
struct NewsData {
    #[serde(default)]
    news_list: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NewsItem {
    Wrapped { news_obj: NewsObject },
    Flat(NewsObject),
}

impl NewsItem {
    fn into_inner(self) -> NewsObject {
        match self {
            NewsItem::Wrapped { news_obj } => news_obj,
            NewsItem::Flat(obj) => obj,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Timestamp {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Timestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewsObject {
    hash_id: Option<String>,
    title: Option<String>,
    content: Option<String>,
    source_name: Option<String>,
    source_url: Option<String>,
    shortened_url: Option<String>,
    /// `None` when the field is absent or null.
    image_url: Option<String>,
    created_at: Option<Timestamp>,
    tags: Option<Vec<String>>,
    category_names: Option<Vec<String>>,
}

impl NewsObject {
    fn article_url(&self) -> Option<String> {
        [&self.source_url, &self.shortened_url]
            .into_iter()
            .flatten()
            .map(|u| u.trim())
            .find(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| {
                let hash = self.hash_id.as_deref()?.trim();
                (!hash.is_empty()).then(|| format!("{}{}", ARTICLE_URL_PREFIX, hash))
            })
    }

    fn into_article(self, category: &str) -> Option<Article> {
        // the API is expected to carry an image field on every item
        let image = self.image_url.clone()?;

        let url = self.article_url()?;
        let article = Article::new(&url, self.title.as_deref()?, SOURCE_ID)?;

        let tags = std::iter::once(category.to_string())
            .chain(self.tags.into_iter().flatten())
            .chain(self.category_names.into_iter().flatten());

        Some(
            article
                .with_published(self.created_at.as_ref().and_then(Timestamp::to_utc))
                .with_summary(self.content.as_deref().map(collapse_whitespace))
                .with_tags(tags)
                .with_image(Some(image))
                .with_original_source(self.source_name)
                .with_external_id(self.hash_id),
        )
    }
}

pub struct CategoryApiAdapter {
    client: Arc<dyn HttpClient>,
    base_url: String,
    categories: Vec<CategoryConfig>,
}

impl CategoryApiAdapter {
    pub fn new(
        client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        categories: Vec<CategoryConfig>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            categories,
        }
    }

    pub fn news_url(&self, category: &str, max_items: usize) -> String {
        format!(
            "{}/news?category={}&max_limit={}&include_card_data=true",
            self.base_url, category, max_items
        )
    }

    pub fn topics_url(&self) -> String {
        format!("{}/search/trending_topics", self.base_url)
    }

    /// Fetch one category. 403/429 are reported as [`FetchError::Rejected`].
    pub async fn fetch(&self, category: &str, limit: usize) -> Result<Batch, FetchError> {
        let url = self.news_url(category, limit);
        let body = self
            .client
            .get(&url, HeaderProfile::Browser)
            .await
            .map_err(|e| match e {
                FetchError::Status(code @ (403 | 429)) => FetchError::Rejected(code),
                other => other,
            })?;

        parse_news(&body, category, limit)
    }

    /// Trending topic names. Any failure yields an empty list.
    pub async fn trending_topics(&self) -> Vec<String> {
        match self.client.get(&self.topics_url(), HeaderProfile::Browser).await {
            Ok(body) => parse_topics(&body),
            Err(e) => {
                warn!(error = %e, "failed to fetch trending topics");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for CategoryApiAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::CategoryApi
    }

    /// One unit per category, highest priority first. The per-category cap
    /// comes from the category table, not the shared per-source limit.
    fn plan(&self, _per_source_limit: usize) -> Vec<FetchUnit> {
        let mut categories: Vec<&CategoryConfig> = self.categories.iter().collect();
        categories.sort_by_key(|c| c.priority);

        categories
            .into_iter()
            .map(|c| FetchUnit::new(SourceKind::CategoryApi, c.key.clone(), c.max_items))
            .collect()
    }

    async fn fetch_unit(&self, unit: &FetchUnit) -> Result<Batch, FetchError> {
        self.fetch(&unit.target, unit.limit).await
    }
}

/// Parse a category response. A missing `data` object is malformed; items
/// that fail to deserialize or validate are skipped.
pub fn parse_news(body: &str, category: &str, limit: usize) -> Result<Batch, FetchError> {
    let envelope: NewsEnvelope =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let mut articles = Vec::new();
    let mut skipped = 0;

    for item in envelope.data.news_list.unwrap_or_default() {
        if articles.len() >= limit {
            break;
        }
        let article = serde_json::from_value::<NewsItem>(item)
            .ok()
            .and_then(|item| item.into_inner().into_article(category));

        match article {
            Some(article) => articles.push(article),
            None => skipped += 1,
        }
    }

    debug!(category, count = articles.len(), skipped, "parsed category response");
    Ok(Batch::new(articles, skipped))
}

/// Topic names from either a list of strings or a list of objects with a
/// name-like field, at the top level or under `data`.
pub fn parse_topics(body: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };

    let list = [
        value.pointer("/data/topics"),
        value.pointer("/data/trending_topics"),
        value.pointer("/topics"),
        value.pointer("/trending_topics"),
        value.pointer("/data"),
        Some(&value),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_array);

    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => ["name", "title", "topic", "label", "tag"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
