use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::images;

/// One normalized news article, whatever upstream it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub source: String,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub original_source: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub external_id: Option<String>,
}

impl Article {
    /// Build an article from its required fields.
    ///
    /// Returns `None` when the title is blank or the URL is not an absolute
    /// http(s) URL; such records never leave an adapter.
    pub fn new(url: &str, title: &str, source: &str) -> Option<Self> {
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            return None;
        }

        let url = url.trim();
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return None;
        }

        Some(Self {
            url: url.to_string(),
            title,
            published_at: None,
            summary: None,
            source: source.to_string(),
            tags: Vec::new(),
            image: None,
            original_source: None,
            scraped_at: Utc::now(),
            external_id: None,
        })
    }

    pub fn with_published(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|s| !s.trim().is_empty());
        self
    }

    /// Append tags, keeping first-seen order and dropping repeats and blanks.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
                self.tags.push(tag.to_string());
            }
        }
        self
    }

    /// Set the preview image. Candidates that fail validation are discarded.
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image.as_deref().and_then(images::sanitize);
        self
    }

    pub fn with_original_source(mut self, original_source: Option<String>) -> Self {
        self.original_source = original_source.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Host of the article URL, without a leading `www.`.
    pub fn host(&self) -> Option<String> {
        host_of(&self.url)
    }
}

/// Lowercased host of a URL with any leading `www.` removed.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}
