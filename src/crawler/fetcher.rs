//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a per-request timeout
//! - Content-Type filtering (only HTML counts as a page)
//! - Error classification into retryable and permanent failures

use crate::config::{CrawlerConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: Url,
    /// Final URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Why a single page fetch failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Not an HTML page: {content_type}")]
    NotHtml { content_type: String },
}

impl FetchError {
    /// Timeouts, connection problems, 429 and 5xx may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Http { status } => *status == 429 || *status >= 500,
            Self::NotHtml { .. } => false,
        }
    }
}

/// The page-fetch collaborator
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one URL and returns its HTML body
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Crawl settings; supplies the request timeout
///
/// # Example
///
/// ```no_run
/// use outreach_pipeline::config::{CrawlerConfig, UserAgentConfig};
/// use outreach_pipeline::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "OutreachBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.request_timeout_secs.min(10)))
        .redirect(Policy::limited(5))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`PageFetcher`]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &UserAgentConfig, crawler: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, crawler)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// A missing Content-Type is treated as HTML
fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        }
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Network("Connection refused".to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if !is_html(content_type.as_deref()) {
            return Err(FetchError::NotHtml {
                content_type: content_type.unwrap_or_default(),
            });
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        Ok(FetchedPage {
            url: url.clone(),
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
        })
    }
}
