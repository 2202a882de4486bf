//! Page fetching for the extraction engine
//!
//! Provides the [`PageFetcher`] capability, an HTTP implementation with
//! browser-like headers and retry, and a fixture-backed implementation.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use scraper::Html;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Errors that can occur during scraping operations
#[derive(Error, Debug)]
pub enum ScraperError {
    /// Network-related errors (connection timeout, DNS failure, etc.)
    #[error("Failed to connect to server: {0}")]
    NetworkError(String),

    /// HTTP non-200 status code errors
    #[error("Server returned status {0}")]
    HttpError(u16),

    /// Error reading response body
    #[error("Failed to read response body: {0}")]
    ResponseError(String),

    /// Rate limited by server
    #[error("Rate limited, retry after delay")]
    RateLimited,
}

/// A fetched page: the URL it was requested from and its markup
#[derive(Debug, Clone)]
pub struct Page {
    /// The URL the page was requested from
    pub url: String,
    /// The HTML content of the page
    pub html: String,
}

impl Page {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Parse the markup into a selector-addressable document
    ///
    /// The tree is not `Send`; parse it in synchronous code after the fetch
    /// completes rather than holding it across an await.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Retrieves pages for the extraction engine
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return its markup
    async fn fetch(&self, url: &str) -> Result<Page, ScraperError>;
}

/// Serves canned pages keyed by URL, for deterministic tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
    requests: Arc<AtomicUsize>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the markup returned for `url`
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Number of fetches served or refused so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, ScraperError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(html) => Ok(Page::new(url, html.clone())),
            None => Err(ScraperError::HttpError(404)),
        }
    }
}

/// Request pacing and retry settings for [`Scraper`]
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Minimum pause before each request after the first, in milliseconds
    pub min_delay_ms: u64,
    /// Maximum pause before each request after the first, in milliseconds
    pub max_delay_ms: u64,
    /// Whether to rotate user agents
    pub rotate_user_agent: bool,
    /// Attempts per URL for retryable failures (429, 5xx)
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub backoff_base_ms: u64,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 300,
            rotate_user_agent: true,
            max_retries: 3,
            backoff_base_ms: 500,
            timeout: Duration::from_secs(30),
        }
    }
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
];

/// HTTP page fetcher with browser-like headers
pub struct Scraper {
    client: Client,
    config: ScraperConfig,
    request_count: AtomicUsize,
}

impl Default for Scraper {
    fn default() -> Self {
        Self::new()
    }
}

impl Scraper {
    /// Create a new Scraper with default configuration
    pub fn new() -> Self {
        Self::with_config(ScraperConfig::default())
    }

    /// Create a new Scraper with custom configuration
    pub fn with_config(config: ScraperConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            config,
            request_count: AtomicUsize::new(0),
        }
    }

    fn user_agent(&self) -> &'static str {
        if self.config.rotate_user_agent {
            let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
            USER_AGENTS[idx]
        } else {
            USER_AGENTS[0]
        }
    }

    async fn pace(&self) {
        let (min, max) = (self.config.min_delay_ms, self.config.max_delay_ms.max(self.config.min_delay_ms));
        let delay = rand::thread_rng().gen_range(min..=max);
        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.config.backoff_base_ms * 2u64.pow(attempt);
        let jitter = rand::thread_rng().gen_range(0..250);
        sleep(Duration::from_millis(delay + jitter)).await;
    }

    /// Fetch `url`, retrying rate limits and server errors with backoff
    pub async fn fetch_page(&self, url: &str) -> Result<Page, ScraperError> {
        if self.request_count.fetch_add(1, Ordering::SeqCst) > 0 {
            self.pace().await;
        }

        let mut last_error = None;

        for attempt in 0..self.config.max_retries.max(1) {
            if attempt > 0 {
                self.backoff(attempt).await;
            }

            match self.get_once(url).await {
                Ok(page) => return Ok(page),
                Err(err @ ScraperError::RateLimited) => {
                    tracing::warn!("Rate limited fetching {} (attempt {})", url, attempt + 1);
                    last_error = Some(err);
                }
                Err(ScraperError::HttpError(status)) if status >= 500 => {
                    tracing::warn!("HTTP {} fetching {} (attempt {})", status, url, attempt + 1);
                    last_error = Some(ScraperError::HttpError(status));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ScraperError::NetworkError("Max retries exceeded".to_string())))
    }

    async fn get_once(&self, url: &str) -> Result<Page, ScraperError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7")
            .header("Cache-Control", "no-cache")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScraperError::NetworkError("Connection timeout".to_string())
                } else if e.is_connect() {
                    ScraperError::NetworkError("Failed to connect to server".to_string())
                } else {
                    ScraperError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::RateLimited);
        }
        if !status.is_success() {
            return Err(ScraperError::HttpError(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScraperError::ResponseError(e.to_string()))?;

        Ok(Page::new(url, html))
    }

    /// Number of pages requested through this scraper
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for Scraper {
    async fn fetch(&self, url: &str) -> Result<Page, ScraperError> {
        self.fetch_page(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scraper_creation() {
        let scraper = Scraper::new();
        assert_eq!(scraper.request_count(), 0);
    }

    #[test]
    fn test_default_config() {
        let config = ScraperConfig::default();
        assert!(config.min_delay_ms <= config.max_delay_ms);
        assert!(config.rotate_user_agent);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_user_agent_from_pool() {
        let scraper = Scraper::new();
        assert!(USER_AGENTS.contains(&scraper.user_agent()));

        let fixed = Scraper::with_config(ScraperConfig {
            rotate_user_agent: false,
            ..ScraperConfig::default()
        });
        assert_eq!(fixed.user_agent(), USER_AGENTS[0]);
    }

    #[test]
    fn test_page_document_is_queryable() {
        let page = Page::new("https://site.com/", "<html><body><h1 class=\"t\">Hi</h1></body></html>");
        let doc = page.document();
        let selector = scraper::Selector::parse("h1.t").unwrap();
        let text: String = doc.select(&selector).next().unwrap().text().collect();
        assert_eq!(text, "Hi");
    }

    #[tokio::test]
    async fn test_fixture_fetcher_serves_registered_pages() {
        let fetcher = FixtureFetcher::new().with_page("https://site.com/", "<p>ok</p>");

        let page = fetcher.fetch("https://site.com/").await.unwrap();
        assert_eq!(page.url, "https://site.com/");
        assert_eq!(page.html, "<p>ok</p>");

        let missing = fetcher.fetch("https://site.com/missing").await;
        assert!(matches!(missing, Err(ScraperError::HttpError(404))));
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let scraper = Scraper::with_config(ScraperConfig {
            max_retries: 1,
            timeout: Duration::from_secs(2),
            ..ScraperConfig::default()
        });
        let result = scraper.fetch_page("http://127.0.0.1:1/").await;
        assert!(matches!(result, Err(ScraperError::NetworkError(_))));
    }
}
