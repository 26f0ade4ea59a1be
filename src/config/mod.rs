use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::SourceKind;
use crate::errors::{ScraperError, ScraperResult};
use crate::sources::webpage::DEFAULT_LINK_PATTERNS;
use crate::sources::CategoryConfig;

pub const DEFAULT_CATEGORY_API_BASE_URL: &str = "https://inshorts.com/api/en";

pub const DEFAULT_WEBPAGE_TARGET_URL: &str = "https://medium.com/tag/trending";

/// Global news, technology, business, science, culture, regional and social
/// feeds, followed by publication feeds.
pub const DEFAULT_FEEDS: &[&str] = &[
    "http://feeds.bbci.co.uk/news/world/rss.xml",
    "https://www.theguardian.com/world/rss",
    "https://www.aljazeera.com/xml/rss/all.xml",
    "https://techcrunch.com/feed/",
    "https://www.wired.com/feed/rss",
    "https://www.theverge.com/rss/index.xml",
    "http://feeds.arstechnica.com/arstechnica/index",
    "https://feeds.bloomberg.com/markets/news.rss",
    "https://www.ft.com/rss/home",
    "https://www.forbes.com/real-time/feed2/",
    "https://www.nature.com/nature.rss",
    "http://rss.sciam.com/ScientificAmerican-Global",
    "https://www.newscientist.com/feed/home/",
    "https://www.who.int/rss-feeds/news-english.xml",
    "https://medium.com/feed/tag/trending",
    "https://medium.com/feed/tag/culture",
    "https://feeds.npr.org/1001/rss.xml",
    "http://rss.cnn.com/rss/edition.rss",
    "https://rss.dw.com/rdf/rss-en-all",
    "https://www.france24.com/en/rss",
    "http://www.chinadaily.com.cn/rss/world_rss.xml",
    "https://www.reddit.com/r/worldnews/.rss",
    "https://hnrss.org/frontpage",
    "https://towardsdatascience.com/feed",
    "https://medium.com/feed/hackernoon",
    "https://medium.com/feed/the-startup",
    "https://medium.com/feed/better-programming",
    "https://medium.com/feed/better-humans",
    "https://medium.com/feed/the-mission",
    "https://medium.com/feed/personal-growth",
    "https://medium.com/feed/thrive-global",
    "https://uxdesign.cc/feed",
    "https://medium.com/feed/swlh",
    "https://medium.com/feed/change-becomes-you",
    "https://medium.com/feed/global-perspectives",
];

/// Domains whose article pages may be fetched to find a preview image.
pub const DEFAULT_TRUSTED_IMAGE_DOMAINS: &[&str] = &[
    "bbc.co.uk",
    "bbc.com",
    "theguardian.com",
    "aljazeera.com",
    "techcrunch.com",
    "wired.com",
    "theverge.com",
    "arstechnica.com",
    "bloomberg.com",
    "ft.com",
    "forbes.com",
    "nature.com",
    "scientificamerican.com",
    "newscientist.com",
    "npr.org",
    "cnn.com",
    "dw.com",
    "france24.com",
    "reuters.com",
    "medium.com",
    "towardsdatascience.com",
    "uxdesign.cc",
];

/// `(key, max items, priority)` for the news API.
const DEFAULT_CATEGORIES: &[(&str, usize, u8)] = &[
    ("top_stories", 10, 1),
    ("trending", 8, 2),
    ("business", 5, 3),
    ("technology", 5, 4),
    ("world", 5, 5),
];

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub target_article_count: usize,
    pub rate_limit_delay: Duration,
    /// Ceiling on attempts per fetch unit, first attempt included.
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub worker_count: usize,
    /// Articles taken from each feed and from the scrape target.
    pub feed_article_limit: usize,
    pub log_level: String,
    pub auto_cleanup_enabled: bool,
    pub cleanup_months_old: u32,
    pub enable_feeds: bool,
    pub enable_webpage: bool,
    pub enable_category_api: bool,
    pub trusted_image_domains: Vec<String>,
    pub category_api_base_url: String,
    pub webpage_target_url: String,
    /// Path fragments that mark a listing link as an article.
    pub webpage_link_patterns: Vec<String>,
    pub feeds: Vec<String>,
    pub categories: Vec<CategoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./articles.db".to_string(),
            target_article_count: 50,
            rate_limit_delay: Duration::from_secs(2),
            max_retries: 3,
            request_timeout: Duration::from_secs(10),
            worker_count: 8,
            feed_article_limit: 3,
            log_level: "info".to_string(),
            auto_cleanup_enabled: true,
            cleanup_months_old: 2,
            enable_feeds: true,
            enable_webpage: true,
            enable_category_api: true,
            trusted_image_domains: DEFAULT_TRUSTED_IMAGE_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            category_api_base_url: DEFAULT_CATEGORY_API_BASE_URL.to_string(),
            webpage_target_url: DEFAULT_WEBPAGE_TARGET_URL.to_string(),
            webpage_link_patterns: DEFAULT_LINK_PATTERNS.iter().map(|p| p.to_string()).collect(),
            feeds: DEFAULT_FEEDS.iter().map(|f| f.to_string()).collect(),
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|&(key, max_items, priority)| CategoryConfig::new(key, max_items, priority))
                .collect(),
        }
    }
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> ScraperResult<Self> {
        let exe_dir = Self::exe_dir();

        // Try to load .env from executable's directory first
        if let Some(ref dir) = exe_dir {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Default db_path is relative to executable directory
        if std::env::var("ARTICLES_DB_PATH").is_err() {
            if let Some(dir) = exe_dir {
                config.db_path = dir.join("articles.db").to_string_lossy().into_owned();
            }
        }

        Ok(config)
    }

    /// Build a config from any key lookup, falling back to defaults for
    /// unset or blank keys.
    pub fn from_lookup<F>(lookup: F) -> ScraperResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let rate_limit_delay = match get("RATE_LIMIT_DELAY") {
            Some(raw) => parse_seconds("RATE_LIMIT_DELAY", &raw)?,
            None => defaults.rate_limit_delay,
        };
        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_seconds("REQUEST_TIMEOUT_SECS", &raw)?,
            None => defaults.request_timeout,
        };

        let config = Self {
            db_path: get("ARTICLES_DB_PATH").unwrap_or(defaults.db_path),
            target_article_count: parse_or(&get, "TARGET_ARTICLE_COUNT", defaults.target_article_count)?,
            rate_limit_delay,
            max_retries: parse_or(&get, "MAX_RETRIES", defaults.max_retries)?,
            request_timeout,
            worker_count: parse_or(&get, "WORKER_COUNT", defaults.worker_count)?,
            feed_article_limit: parse_or(&get, "FEED_ARTICLE_LIMIT", defaults.feed_article_limit)?,
            log_level: get("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.log_level),
            auto_cleanup_enabled: parse_flag(&get, "AUTO_CLEANUP_ENABLED", defaults.auto_cleanup_enabled)?,
            cleanup_months_old: parse_or(&get, "CLEANUP_MONTHS_OLD", defaults.cleanup_months_old)?,
            enable_feeds: parse_flag(&get, "ENABLE_FEEDS", defaults.enable_feeds)?,
            enable_webpage: parse_flag(&get, "ENABLE_WEBPAGE", defaults.enable_webpage)?,
            enable_category_api: parse_flag(&get, "ENABLE_CATEGORY_API", defaults.enable_category_api)?,
            trusted_image_domains: get("TRUSTED_IMAGE_DOMAINS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.trusted_image_domains),
            category_api_base_url: get("CATEGORY_API_BASE_URL").unwrap_or(defaults.category_api_base_url),
            webpage_target_url: get("WEBPAGE_TARGET_URL").unwrap_or(defaults.webpage_target_url),
            webpage_link_patterns: get("WEBPAGE_LINK_PATTERNS")
                .map(|raw| split_list(&raw))
                .filter(|patterns| !patterns.is_empty())
                .unwrap_or(defaults.webpage_link_patterns),
            feeds: defaults.feeds,
            categories: defaults.categories,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ScraperResult<()> {
        if self.worker_count == 0 {
            return Err(ScraperError::Config(
                "WORKER_COUNT must be at least 1".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ScraperError::Config(
                "MAX_RETRIES must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ScraperError::Config(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Enabled source kinds in adapter priority order.
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                SourceKind::CategoryApi => self.enable_category_api,
                SourceKind::Feed => self.enable_feeds,
                SourceKind::Webpage => self.enable_webpage,
            })
            .collect()
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> ScraperResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ScraperError::InvalidEnvVar {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parse_flag<F>(get: &F, key: &str, default: bool) -> ScraperResult<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ScraperError::InvalidEnvVar {
                key: key.to_string(),
                value: raw,
            }),
        },
        None => Ok(default),
    }
}

fn parse_seconds(key: &str, raw: &str) -> ScraperResult<Duration> {
    raw.parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ScraperError::InvalidEnvVar {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
