use serde::{Deserialize, Serialize};

use super::Article;
use crate::errors::FetchError;

/// The three upstream shapes the pipeline knows how to read.
///
/// Declaration order is adapter priority: when two sources produce the same
/// URL the earlier kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    CategoryApi,
    Feed,
    Webpage,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::CategoryApi, SourceKind::Feed, SourceKind::Webpage];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CategoryApi => "category_api",
            SourceKind::Feed => "feed",
            SourceKind::Webpage => "webpage",
        }
    }

    /// Lower is stronger.
    pub fn priority(&self) -> u8 {
        match self {
            SourceKind::CategoryApi => 0,
            SourceKind::Feed => 1,
            SourceKind::Webpage => 2,
        }
    }

    pub fn upstream_class(&self) -> UpstreamClass {
        match self {
            SourceKind::CategoryApi => UpstreamClass::CategoryApi,
            SourceKind::Feed => UpstreamClass::Feed,
            SourceKind::Webpage => UpstreamClass::Webpage,
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "category_api" | "category" | "api" => Ok(SourceKind::CategoryApi),
            "feed" | "feeds" | "rss" => Ok(SourceKind::Feed),
            "webpage" | "web" | "scrape" => Ok(SourceKind::Webpage),
            _ => Err(format!("Unknown source kind: {}", s)),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rate-limit bucket. Every outbound request belongs to exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamClass {
    Feed,
    Webpage,
    CategoryApi,
    PageFallback,
}

/// One independently retried piece of work: a feed URL, an API category,
/// or a scrape target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchUnit {
    pub source: SourceKind,
    /// Feed URL, category key, or listing URL.
    pub target: String,
    pub limit: usize,
}

impl FetchUnit {
    pub fn new(source: SourceKind, target: impl Into<String>, limit: usize) -> Self {
        Self {
            source,
            target: target.into(),
            limit,
        }
    }
}

/// What an adapter hands back for one successful unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub articles: Vec<Article>,
    /// Records dropped during normalization or pages that failed to parse.
    pub skipped: usize,
}

impl Batch {
    pub fn new(articles: Vec<Article>, skipped: usize) -> Self {
        Self { articles, skipped }
    }
}

/// Result of one unit after the retry policy has run its course.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub source: SourceKind,
    pub unit: String,
    pub articles: Vec<Article>,
    pub error: Option<FetchError>,
    /// Some records of an otherwise successful unit were skipped.
    pub partial: bool,
    pub attempts: u32,
}

impl FetchResult {
    pub fn success(unit: &FetchUnit, batch: Batch, attempts: u32) -> Self {
        Self {
            source: unit.source,
            unit: unit.target.clone(),
            partial: batch.skipped > 0,
            articles: batch.articles,
            error: None,
            attempts,
        }
    }

    pub fn failure(unit: &FetchUnit, error: FetchError, attempts: u32) -> Self {
        Self {
            source: unit.source,
            unit: unit.target.clone(),
            articles: Vec::new(),
            error: Some(error),
            partial: false,
            attempts,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
