use std::sync::Arc;

use scraper::Html;
use tracing::debug;

use super::extract;
use crate::domain::{Article, UpstreamClass};
use crate::http::{HeaderProfile, HttpClient};
use crate::services::rate_limit::RateLimiter;

/// Last-resort image lookup: fetch the article page once and read its
/// Open Graph / Twitter card / featured-image metadata.
///
/// Only domains on the allowlist are fetched.
pub struct ImageResolver {
    client: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiter>,
    trusted_domains: Vec<String>,
}

impl ImageResolver {
    pub fn new(
        client: Arc<dyn HttpClient>,
        limiter: Arc<RateLimiter>,
        trusted_domains: Vec<String>,
    ) -> Self {
        let trusted_domains = trusted_domains
            .into_iter()
            .map(|d| canonical_domain(&d))
            .filter(|d| !d.is_empty())
            .collect();

        Self {
            client,
            limiter,
            trusted_domains,
        }
    }

    /// Whether the article's source, or the host of its URL, is allowlisted
    /// (exactly or as a subdomain).
    pub fn is_trusted(&self, article: &Article) -> bool {
        let source = canonical_domain(&article.source);
        let candidates = [Some(source), article.host()];

        candidates.iter().flatten().any(|host| {
            self.trusted_domains
                .iter()
                .any(|domain| host == domain || host.ends_with(&format!(".{}", domain)))
        })
    }

    /// Fetch the article page and return its declared preview image.
    ///
    /// Never retries; every failure is reported as `None`.
    pub async fn resolve_fallback(&self, article: &Article) -> Option<String> {
        if !self.is_trusted(article) {
            debug!(url = %article.url, source = %article.source, "fallback skipped: untrusted domain");
            return None;
        }

        self.limiter.acquire(UpstreamClass::PageFallback).await;

        let body = match self.client.get(&article.url, HeaderProfile::Standard).await {
            Ok(body) => body,
            Err(e) => {
                debug!(url = %article.url, error = %e, "fallback page fetch failed");
                return None;
            }
        };

        let image = image_from_page(&body);
        debug!(url = %article.url, found = image.is_some(), "fallback page inspected");
        image
    }
}

/// Preview image declared in a full HTML page's metadata.
pub fn image_from_page(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    extract::meta_image(&document)
}

fn canonical_domain(value: &str) -> String {
    let value = value.trim().to_lowercase();
    let value = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(&value);
    let value = value.split('/').next().unwrap_or("");
    value.strip_prefix("www.").unwrap_or(value).to_string()
}
