//! Client for a hosted crawl-as-a-service provider
//!
//! A crawl is a job: submit it, poll until it finishes, then fetch the pages.

use crate::config::{CrawlerConfig, HostedCrawlerConfig};
use crate::crawler::coordinator::{CrawlOutput, CrawledPage, SiteCrawler};
use crate::crawler::CrawlError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlJobInput<'a> {
    start_url: &'a str,
    max_pages: u32,
    max_depth: u32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlJob {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct HostedPage {
    url: String,
    html: String,
}

/// [`SiteCrawler`] backed by a hosted crawl service
pub struct HostedCrawlClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    poll_interval: Duration,
    max_polls: u32,
    max_pages: u32,
    max_depth: u32,
}

impl HostedCrawlClient {
    pub fn new(
        client: reqwest::Client,
        hosted: &HostedCrawlerConfig,
        crawler: &CrawlerConfig,
        token: String,
    ) -> Self {
        Self {
            client,
            base_url: hosted.base_url.trim_end_matches('/').to_string(),
            token,
            poll_interval: Duration::from_secs(hosted.poll_interval_secs),
            max_polls: hosted.max_polls,
            max_pages: crawler.max_pages,
            max_depth: crawler.max_depth,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, CrawlError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CrawlError::Hosted(format!("HTTP {}: {}", status.as_u16(), body)))
    }

    /// Submits a crawl job. Returns immediately with job metadata.
    pub async fn start_crawl(&self, root: &Url) -> Result<CrawlJob, CrawlError> {
        let input = CrawlJobInput {
            start_url: root.as_str(),
            max_pages: self.max_pages,
            max_depth: self.max_depth,
        };

        let resp = self
            .client
            .post(format!("{}/crawls", self.base_url))
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;

        let api_resp: ApiResponse<CrawlJob> = Self::check(resp).await?.json().await?;
        Ok(api_resp.data)
    }

    /// Polls until the job finishes, giving up after `max_polls` checks
    pub async fn wait_for_crawl(&self, job_id: &str) -> Result<CrawlJob, CrawlError> {
        for poll in 0..self.max_polls {
            let resp = self
                .client
                .get(format!("{}/crawls/{}", self.base_url, job_id))
                .bearer_auth(&self.token)
                .send()
                .await?;

            let api_resp: ApiResponse<CrawlJob> = Self::check(resp).await?.json().await?;
            match api_resp.data.status.to_ascii_lowercase().as_str() {
                "succeeded" | "completed" => return Ok(api_resp.data),
                "failed" | "aborted" | "timed-out" => {
                    return Err(CrawlError::Hosted(format!(
                        "crawl job {} ended with status {}",
                        job_id, api_resp.data.status
                    )));
                }
                _ => {
                    tracing::debug!(job_id, poll, status = %api_resp.data.status, "Crawl job still running");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(CrawlError::Timeout)
    }

    /// Fetches the pages of a finished job
    pub async fn get_pages(&self, job_id: &str) -> Result<Vec<CrawledPage>, CrawlError> {
        let resp = self
            .client
            .get(format!("{}/crawls/{}/pages", self.base_url, job_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let items: Vec<HostedPage> = Self::check(resp).await?.json().await?;

        let mut pages = Vec::with_capacity(items.len());
        for item in items.into_iter().take(self.max_pages as usize) {
            match Url::parse(&item.url) {
                Ok(url) => pages.push(CrawledPage {
                    url,
                    depth: 0,
                    body: item.html,
                }),
                Err(e) => tracing::warn!(url = %item.url, error = %e, "Dropping hosted page"),
            }
        }
        Ok(pages)
    }
}

#[async_trait]
impl SiteCrawler for HostedCrawlClient {
    async fn crawl_site(&self, root: &Url) -> Result<CrawlOutput, CrawlError> {
        tracing::info!(root = %root, "Starting hosted crawl");

        let job = self.start_crawl(root).await?;
        let finished = self.wait_for_crawl(&job.id).await?;
        let pages = self.get_pages(&finished.id).await?;
        tracing::info!(job_id = %finished.id, count = pages.len(), "Fetched hosted crawl pages");

        if pages.is_empty() {
            return Err(CrawlError::NoPages);
        }

        Ok(CrawlOutput {
            pages,
            budget_exhausted: false,
        })
    }
}
