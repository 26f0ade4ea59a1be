//! Outbound HTTP seam. Everything the pipeline reads goes through
//! [`HttpClient`], so tests can script upstream behaviour.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::errors::{FetchError, ScraperResult};

/// Desktop browser user agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Extra headers that make API calls look like an ordinary browser tab.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
    ("content-type", "application/json"),
    ("dnt", "1"),
    ("pragma", "no-cache"),
    (
        "sec-ch-ua",
        "\"Google Chrome\";v=\"137\", \"Chromium\";v=\"137\", \"Not/A)Brand\";v=\"24\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
];

const CONNECT_TIMEOUT_SECS: u64 = 5;

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    /// User agent only.
    Standard,
    /// Full browser header set, for upstreams that reject automated traffic.
    Browser,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and return the body of a 2xx response.
    ///
    /// Non-2xx responses become [`FetchError::Status`]; transport failures
    /// become `Timeout` or `Connection`.
    async fn get(&self, url: &str, profile: HeaderProfile) -> Result<String, FetchError>;
}

pub struct ReqwestClient {
    client: Client,
    browser_headers: HeaderMap,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> ScraperResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            browser_headers: browser_header_map(),
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, profile: HeaderProfile) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        if profile == HeaderProfile::Browser {
            request = request.headers(self.browser_headers.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_transport(&e))
    }
}

fn browser_header_map() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in BROWSER_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}
