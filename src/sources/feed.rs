use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{host_of, Article, Batch, FetchUnit, SourceKind};
use crate::errors::FetchError;
use crate::http::{HeaderProfile, HttpClient};
use crate::images::{self, extract};
use crate::sources::html::summary_from_html;
use crate::sources::traits::SourceAdapter;

/// Non-standard item elements some publishers use for a preview image.
const CUSTOM_IMAGE_FIELDS: &[&[u8]] = &[b"image", b"featured_image", b"thumbnail", b"img", b"picture"];

const SUMMARY_MAX_CHARS: usize = 500;

/// One syndication entry with every field the pipeline may read, before
/// validation. Produced from either RSS or Atom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub id: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub summary_html: Option<String>,
    pub content_html: Option<String>,
    pub categories: Vec<String>,
    /// `media:content` URLs, untyped or typed `image/*`.
    pub media_content: Vec<String>,
    pub thumbnails: Vec<String>,
    /// RSS `<enclosure>` URLs whose MIME type is `image/*` or absent.
    pub image_enclosures: Vec<String>,
    /// `<link>` elements declared as images.
    pub image_links: Vec<String>,
    pub custom_image: Option<String>,
}

impl FeedEntry {
    /// feed-rs reports RSS enclosures as media objects too; `extras`
    /// carries the enclosure URLs seen in the raw item to tell them apart.
    fn from_feed_rs(entry: feed_rs::model::Entry, extras: EntryExtras) -> Self {
        let mut media_content = Vec::new();
        let mut image_enclosures = Vec::new();
        let mut thumbnails = Vec::new();

        for object in &entry.media {
            for content in &object.content {
                let Some(url) = content.url.as_ref().map(|u| u.to_string()) else {
                    continue;
                };
                let is_image = content
                    .content_type
                    .as_ref()
                    .map_or(true, |mime| mime.to_string().starts_with("image/"));
                if !is_image {
                    continue;
                }
                if extras.enclosures.contains(&url) {
                    image_enclosures.push(url);
                } else {
                    media_content.push(url);
                }
            }
            thumbnails.extend(object.thumbnails.iter().map(|t| t.image.uri.clone()));
        }

        let image_links = entry
            .links
            .iter()
            .filter(|l| is_image_link(l.rel.as_deref(), l.media_type.as_deref()))
            .map(|l| l.href.clone())
            .collect();

        let link = entry
            .links
            .iter()
            .filter(|l| !is_image_link(l.rel.as_deref(), l.media_type.as_deref()))
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| {
                entry.links.iter().find(|l| {
                    l.rel.as_deref() != Some("enclosure")
                        && !is_image_link(l.rel.as_deref(), l.media_type.as_deref())
                })
            })
            .map(|l| l.href.clone())
            .or_else(|| {
                // RSS guids are frequently the permalink
                let id = entry.id.trim();
                (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
            });

        Self {
            id: entry.id,
            title: entry.title.map(|t| t.content),
            link,
            published: entry.published.or(entry.updated),
            summary_html: entry.summary.map(|s| s.content),
            content_html: entry.content.and_then(|c| c.body),
            categories: entry.categories.into_iter().map(|c| c.term).collect(),
            media_content,
            thumbnails,
            image_enclosures,
            image_links,
            custom_image: extras.custom_image,
        }
    }

    /// Preview image by the first matching rule: media content, thumbnail,
    /// image enclosure, image link, custom field, then an `<img>` in the
    /// summary or content HTML.
    pub fn image(&self) -> Option<String> {
        self.media_content
            .iter()
            .chain(&self.thumbnails)
            .chain(&self.image_enclosures)
            .chain(&self.image_links)
            .chain(&self.custom_image)
            .find_map(|candidate| images::sanitize(candidate))
            .or_else(|| {
                [&self.summary_html, &self.content_html]
                    .into_iter()
                    .flatten()
                    .find_map(|html| extract::first_image_in_html(html))
            })
    }

    /// Validating step into the canonical shape. `None` drops the entry.
    pub fn into_article(self, source: &str) -> Option<Article> {
        let image = self.image();
        let summary = self
            .summary_html
            .as_deref()
            .or(self.content_html.as_deref())
            .and_then(|html| summary_from_html(html, SUMMARY_MAX_CHARS));

        let article = Article::new(self.link.as_deref()?, self.title.as_deref()?, source)?;
        Some(
            article
                .with_published(self.published)
                .with_summary(summary)
                .with_tags(&self.categories)
                .with_image(image),
        )
    }
}

fn is_image_link(rel: Option<&str>, media_type: Option<&str>) -> bool {
    let typed_image = media_type.is_some_and(|t| t.starts_with("image/"));
    matches!(rel, Some("image") | Some("icon")) || typed_image
}

pub struct FeedAdapter {
    client: Arc<dyn HttpClient>,
    feeds: Vec<String>,
}

impl FeedAdapter {
    pub fn new(client: Arc<dyn HttpClient>, feeds: Vec<String>) -> Self {
        Self { client, feeds }
    }

    pub async fn fetch(&self, feed_url: &str, limit: usize) -> Result<Batch, FetchError> {
        let body = self.client.get(feed_url, HeaderProfile::Standard).await?;
        parse_feed(body.as_bytes(), feed_url, limit)
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    fn plan(&self, per_source_limit: usize) -> Vec<FetchUnit> {
        self.feeds
            .iter()
            .map(|url| FetchUnit::new(SourceKind::Feed, url.clone(), per_source_limit))
            .collect()
    }

    async fn fetch_unit(&self, unit: &FetchUnit) -> Result<Batch, FetchError> {
        self.fetch(&unit.target, unit.limit).await
    }
}

/// Parse a feed payload into at most `limit` articles.
///
/// Entries without a title or link are skipped and counted.
pub fn parse_feed(bytes: &[u8], feed_url: &str, limit: usize) -> Result<Batch, FetchError> {
    let feed = parser::parse(bytes).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let source = host_of(feed_url).unwrap_or_else(|| feed_url.to_string());

    let extras = entry_extras(bytes);
    let extras = if extras.len() == feed.entries.len() {
        extras
    } else {
        debug!(feed = %feed_url, "raw entry scan misaligned with entries; ignoring");
        vec![EntryExtras::default(); feed.entries.len()]
    };

    let mut articles = Vec::new();
    let mut skipped = 0;

    for (entry, extras) in feed.entries.into_iter().zip(extras) {
        if articles.len() >= limit {
            break;
        }
        let entry = FeedEntry::from_feed_rs(entry, extras);

        let id = entry.id.clone();
        match entry.into_article(&source) {
            Some(article) => articles.push(article),
            None => {
                skipped += 1;
                debug!(feed = %feed_url, entry = %id, "dropping entry without title or link");
            }
        }
    }

    if skipped > 0 {
        warn!(feed = %feed_url, skipped, "feed contained unusable entries");
    }

    Ok(Batch::new(articles, skipped))
}

/// What feed-rs drops or merges for one `<item>`/`<entry>`.
#[derive(Debug, Clone, Default, PartialEq)]
struct EntryExtras {
    custom_image: Option<String>,
    /// `<enclosure url>` values, normalized the way feed-rs renders URLs.
    enclosures: Vec<String>,
}

fn enclosure_url(e: &BytesStart) -> Option<String> {
    let attr = e.try_get_attribute("url").ok()??;
    let raw = attr.unescape_value().ok()?;
    let raw = raw.trim();
    Some(Url::parse(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()))
}

/// Second pass over the raw document, one slot per `<item>`/`<entry>` in
/// document order.
fn entry_extras(bytes: &[u8]) -> Vec<EntryExtras> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut found = Vec::new();

    let mut in_entry = false;
    let mut depth = 0usize;
    let mut capturing = false;
    let mut text = String::new();
    let mut current = EntryExtras::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if !in_entry {
                    if name == b"item" || name == b"entry" {
                        in_entry = true;
                        depth = 0;
                        current = EntryExtras::default();
                    }
                } else {
                    depth += 1;
                    if depth == 1 && name == b"enclosure" {
                        current.enclosures.extend(enclosure_url(&e));
                    } else if depth == 1
                        && current.custom_image.is_none()
                        && CUSTOM_IMAGE_FIELDS.iter().any(|f| *f == name)
                    {
                        capturing = true;
                        text.clear();
                    }
                }
            }
            Ok(Event::Empty(e)) if in_entry && depth == 0 => {
                if e.local_name().as_ref() == b"enclosure" {
                    current.enclosures.extend(enclosure_url(&e));
                }
            }
            Ok(Event::Text(t)) if capturing => {
                if let Ok(unescaped) = t.unescape() {
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) if capturing => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) if in_entry => {
                if depth == 0 {
                    found.push(std::mem::take(&mut current));
                    in_entry = false;
                } else {
                    if capturing && depth == 1 {
                        capturing = false;
                        current.custom_image = images::sanitize(text.trim());
                    }
                    depth -= 1;
                }
            }
            Ok(Event::Eof) => break,
            // feed-rs already accepted the document; a stricter reader
            // failing here only costs the extras
            Err(_) => return Vec::new(),
            _ => {}
        }
        buf.clear();
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockHttpClient;

    const SAMPLE_RSS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Mock Tech News</title>
    <link>https://mocktech.com/</link>
    <description>Tech.</description>
    <item>
      <title>RSS Article with Media Content</title>
      <link>https://mocktech.com/article1</link>
      <description>Article with media content image</description>
      <pubDate>Mon, 13 Jan 2025 12:00:00 +0000</pubDate>
      <category>Tech</category>
      <category>AI</category>
      <category>Tech</category>
      <media:content url="https://mocktech.com/media1.jpg"/>
    </item>
    <item>
      <title>RSS Article with HTML Image</title>
      <link>https://mocktech.com/article2</link>
      <description><![CDATA[<p>Article content <img src="https://mocktech.com/html-img.jpg" alt="test"> more content</p>]]></description>
      <pubDate>Mon, 13 Jan 2025 11:00:00 +0000</pubDate>
    </item>
    <item>
      <title>RSS Article without Image</title>
      <link>https://mocktech.com/article3</link>
      <description>Article without any image in RSS</description>
      <pubDate>Mon, 13 Jan 2025 10:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    const ENCLOSURE_AND_CUSTOM_RSS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Mixed</title>
    <link>https://mixed.example.org/</link>
    <description>Mixed.</description>
    <item>
      <title>Enclosure story</title>
      <link>https://mixed.example.org/enclosure</link>
      <enclosure url="https://mixed.example.org/photo.png" type="image/png" length="100"/>
    </item>
    <item>
      <title>Podcast episode</title>
      <link>https://mixed.example.org/podcast</link>
      <enclosure url="https://mixed.example.org/episode.mp3" type="audio/mpeg" length="100"/>
    </item>
    <item>
      <title>Custom field story</title>
      <link>https://mixed.example.org/custom</link>
      <featured_image>//cdn.mixed.example.org/featured.jpg</featured_image>
    </item>
    <item>
      <title></title>
      <link>https://mixed.example.org/untitled</link>
    </item>
    <item>
      <title>No link at all</title>
    </item>
  </channel>
</rss>"#;

    const SAMPLE_ATOM: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Tech Blog</title>
  <link href="https://example.com/"/>
  <id>https://example.com/feed.atom</id>
  <updated>2024-01-15T12:00:00Z</updated>
  <entry>
    <title>Understanding WebAssembly</title>
    <link rel="alternate" href="https://example.com/posts/wasm-intro"/>
    <link rel="enclosure" type="image/jpeg" href="https://example.com/img/wasm.jpg"/>
    <id>https://example.com/posts/wasm-intro</id>
    <updated>2024-01-15T12:00:00Z</updated>
    <summary type="html"><![CDATA[<p>WebAssembly (Wasm) is a binary instruction format...</p>]]></summary>
  </entry>
</feed>"#;

    #[test]
    fn test_rss_articles_normalized() {
        let batch = parse_feed(SAMPLE_RSS, "https://mocktech.com/rss", 10).unwrap();

        assert_eq!(batch.articles.len(), 3);
        assert_eq!(batch.skipped, 0);

        let first = &batch.articles[0];
        assert_eq!(first.title, "RSS Article with Media Content");
        assert_eq!(first.url, "https://mocktech.com/article1");
        assert_eq!(first.source, "mocktech.com");
        assert_eq!(first.tags, vec!["Tech", "AI"]);
        assert_eq!(first.image.as_deref(), Some("https://mocktech.com/media1.jpg"));
        assert!(first.published_at.is_some());
    }

    #[test]
    fn test_rss_image_from_summary_html() {
        let batch = parse_feed(SAMPLE_RSS, "https://mocktech.com/rss", 10).unwrap();

        let second = &batch.articles[1];
        assert_eq!(second.image.as_deref(), Some("https://mocktech.com/html-img.jpg"));
        assert_eq!(second.summary.as_deref(), Some("Article content more content"));

        assert!(batch.articles[2].image.is_none());
    }

    #[test]
    fn test_limit_caps_articles() {
        let batch = parse_feed(SAMPLE_RSS, "https://mocktech.com/rss", 2).unwrap();
        assert_eq!(batch.articles.len(), 2);
    }

    #[test]
    fn test_enclosure_custom_field_and_invalid_entries() {
        let batch = parse_feed(ENCLOSURE_AND_CUSTOM_RSS, "https://mixed.example.org/feed", 10).unwrap();

        assert_eq!(batch.articles.len(), 3);
        assert_eq!(batch.skipped, 2);

        assert_eq!(
            batch.articles[0].image.as_deref(),
            Some("https://mixed.example.org/photo.png")
        );
        assert!(batch.articles[1].image.is_none(), "audio enclosures are not images");
        assert_eq!(
            batch.articles[2].image.as_deref(),
            Some("https://cdn.mixed.example.org/featured.jpg")
        );
    }

    #[test]
    fn test_atom_image_link_and_alternate() {
        let batch = parse_feed(SAMPLE_ATOM, "https://example.com/feed.atom", 10).unwrap();

        assert_eq!(batch.articles.len(), 1);
        let article = &batch.articles[0];
        assert_eq!(article.url, "https://example.com/posts/wasm-intro");
        assert_eq!(article.image.as_deref(), Some("https://example.com/img/wasm.jpg"));
        assert!(article.summary.as_deref().unwrap().starts_with("WebAssembly (Wasm)"));
    }

    #[test]
    fn test_malformed_payload_is_permanent() {
        let err = parse_feed(b"<html><body>not a feed</body></html>", "https://x.org/rss", 5)
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_entry_extras_per_entry() {
        let extras = entry_extras(ENCLOSURE_AND_CUSTOM_RSS);
        assert_eq!(extras.len(), 5);
        assert_eq!(
            extras[2].custom_image.as_deref(),
            Some("https://cdn.mixed.example.org/featured.jpg")
        );
        assert!(extras[0].custom_image.is_none());
        assert_eq!(extras[0].enclosures, vec!["https://mixed.example.org/photo.png"]);
        assert!(extras[2].enclosures.is_empty());
    }

    #[test]
    fn test_typed_media_content_beats_thumbnail_and_enclosure() {
        let rss = br#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>News</title>
    <link>https://news.example.org/</link>
    <description>News.</description>
    <item>
      <title>Story with every kind of image</title>
      <link>https://news.example.org/story</link>
      <enclosure url="https://news.example.org/enclosure.jpg" type="image/jpeg" length="100"/>
      <media:thumbnail url="https://news.example.org/thumb.jpg"/>
      <media:content url="https://news.example.org/full.jpg" type="image/jpeg" medium="image"/>
    </item>
    <item>
      <title>Story with thumbnail and enclosure</title>
      <link>https://news.example.org/second</link>
      <enclosure url="https://news.example.org/second-enclosure.jpg" type="image/jpeg" length="100"/>
      <media:thumbnail url="https://news.example.org/second-thumb.jpg"/>
    </item>
  </channel>
</rss>"#;

        let batch = parse_feed(rss, "https://news.example.org/rss", 10).unwrap();

        assert_eq!(
            batch.articles[0].image.as_deref(),
            Some("https://news.example.org/full.jpg")
        );
        assert_eq!(
            batch.articles[1].image.as_deref(),
            Some("https://news.example.org/second-thumb.jpg")
        );
    }

    #[test]
    fn test_entry_image_order() {
        let entry = FeedEntry {
            media_content: vec!["https://a.com/report.pdf".to_string()],
            thumbnails: vec!["https://a.com/thumb.jpg".to_string()],
            image_enclosures: vec!["https://a.com/enclosure.jpg".to_string()],
            summary_html: Some(r#"<img src="https://a.com/inline.jpg">"#.to_string()),
            ..Default::default()
        };
        assert_eq!(entry.image().as_deref(), Some("https://a.com/thumb.jpg"));
    }

    #[test]
    fn test_plan_one_unit_per_feed() {
        let adapter = FeedAdapter::new(
            Arc::new(MockHttpClient::new()),
            vec!["https://a.com/rss".to_string(), "https://b.com/rss".to_string()],
        );

        let units = adapter.plan(3);
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.source == SourceKind::Feed && u.limit == 3));
        assert_eq!(units[1].target, "https://b.com/rss");
    }

    #[tokio::test]
    async fn test_fetch_propagates_http_error() {
        let mut client = MockHttpClient::new();
        client
            .expect_get()
            .returning(|_, _| Err(FetchError::Status(503)));

        let adapter = FeedAdapter::new(Arc::new(client), Vec::new());
        let err = adapter.fetch("https://a.com/rss", 3).await.unwrap_err();
        assert_eq!(err, FetchError::Status(503));
    }

    #[tokio::test]
    async fn test_fetch_parses_body() {
        let mut client = MockHttpClient::new();
        client
            .expect_get()
            .returning(|_, _| Ok(String::from_utf8_lossy(SAMPLE_RSS).into_owned()));

        let adapter = FeedAdapter::new(Arc::new(client), Vec::new());
        let batch = adapter.fetch("https://mocktech.com/rss", 3).await.unwrap();
        assert_eq!(batch.articles.len(), 3);
    }
}
