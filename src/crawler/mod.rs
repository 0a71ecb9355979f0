//! Crawler module for per-site page retrieval
//!
//! This module contains the crawl side of the pipeline, including:
//! - HTTP fetching behind the `PageFetcher` collaborator
//! - Link extraction for crawl scope
//! - Breadth-first scheduling under page, depth and concurrency bounds
//! - The in-process orchestrator and the hosted crawl client
//! - Site lifecycle bookkeeping around a crawl

mod coordinator;
mod fetcher;
mod hosted;
mod parser;
mod scheduler;

pub use coordinator::{CrawlOrchestrator, CrawlOutput, CrawledPage, SiteCrawler};
pub use fetcher::{build_http_client, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use hosted::{CrawlJob, HostedCrawlClient};
pub use parser::extract_links;
pub use scheduler::{CrawlScheduler, QueuedUrl};

use crate::extract::Extractor;
use crate::storage::Storage;
use crate::{lock_storage, OutreachError, Result, SharedStorage};
use thiserror::Error;
use url::Url;

/// Site-fatal crawl failures
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid site URL: {0}")]
    InvalidUrl(String),

    #[error("Root page {url} could not be fetched: {source}")]
    RootFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("No pages retrieved")]
    NoPages,

    #[error("Crawl timed out")]
    Timeout,

    #[error("Site {0} is already being crawled")]
    AlreadyCrawling(i64),

    #[error("Hosted crawl failed: {0}")]
    Hosted(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl CrawlError {
    /// A later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RootFetch { source, .. } => source.is_retryable(),
            Self::Timeout | Self::Client(_) | Self::Hosted(_) => true,
            Self::InvalidUrl(_) | Self::NoPages | Self::AlreadyCrawling(_) => false,
        }
    }
}

/// What one site crawl produced
#[derive(Debug, Clone)]
pub struct SiteCrawlReport {
    pub site_id: i64,
    pub page_count: u32,
    pub budget_exhausted: bool,
    /// IDs of contacts that were not yet stored for this site
    pub new_contact_ids: Vec<i64>,
}

/// Totals for a batch of site crawls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlBatchReport {
    pub crawled: usize,
    pub failed: usize,
    pub new_contacts: usize,
}

/// Registers a site from a URL or bare domain
///
/// # Returns
///
/// * `Ok((id, domain))` - The new or already registered site
/// * `Err(OutreachError)` - The input is not a usable http(s) site
pub fn register_site<S: Storage>(store: &mut S, input: &str) -> Result<(i64, String)> {
    let (root, domain) = crate::url::canonical_site(input)?;
    let id = store.insert_site(&domain, root.as_str())?;
    tracing::info!(site_id = id, domain = %domain, "Site registered");
    Ok((id, domain))
}

/// Crawls one registered site and persists the result
///
/// The site moves to `crawling` (attempt counter incremented) before the
/// crawl, then to `completed` with its derived signals, or to `failed` with
/// the reason. Contacts discovered in the corpus are stored unless the site
/// already has them.
///
/// # Arguments
///
/// * `storage` - The shared record store
/// * `crawler` - The page provider
/// * `extractor` - Derives signals and contacts from the corpus
/// * `site_id` - The site to crawl
/// * `snapshot_chars` - Bound on the stored content snapshot
///
/// # Returns
///
/// * `Ok(SiteCrawlReport)` - The crawl completed
/// * `Err(OutreachError)` - The site was not found or the crawl failed
pub async fn run_site_crawl(
    storage: &SharedStorage,
    crawler: &dyn SiteCrawler,
    extractor: &Extractor,
    site_id: i64,
    snapshot_chars: usize,
) -> Result<SiteCrawlReport> {
    let root = {
        let mut store = lock_storage(storage)?;
        let site = store
            .get_site(site_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("site {}", site_id)))?;

        if !site.status.can_start_crawl() {
            return Err(CrawlError::AlreadyCrawling(site_id).into());
        }

        let root = Url::parse(&site.url).map_err(|e| CrawlError::InvalidUrl(e.to_string()));
        if let Err(e) = &root {
            store.fail_site_crawl(site_id, &e.to_string())?;
        }
        let root = root?;

        store.mark_site_crawling(site_id)?;
        root
    };

    tracing::info!(site_id, root = %root, "Starting site crawl");

    let output = match crawler.crawl_site(&root).await {
        Ok(output) if output.pages.is_empty() => Err(CrawlError::NoPages),
        other => other,
    };

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(site_id, root = %root, error = %e, "Site crawl failed");
            lock_storage(storage)?.fail_site_crawl(site_id, &e.to_string())?;
            return Err(e.into());
        }
    };

    let corpus = output.corpus();
    let signals = extractor.crawl_signals(&corpus, output.page_count(), snapshot_chars);

    let mut store = lock_storage(storage)?;
    store.complete_site_crawl(site_id, &signals)?;

    let known = store.contact_emails_for_site(site_id)?;
    let discovered = extractor.discover_contacts(&corpus, &known);

    let mut new_contact_ids = Vec::new();
    for contact in &discovered {
        if let Some(id) = store.insert_contact(site_id, contact)? {
            new_contact_ids.push(id);
        }
    }

    tracing::info!(
        site_id,
        pages = signals.page_count,
        words = signals.word_count,
        platform = signals.detected_platform.as_deref().unwrap_or("unknown"),
        new_contacts = new_contact_ids.len(),
        "Site crawl completed"
    );

    Ok(SiteCrawlReport {
        site_id,
        page_count: signals.page_count,
        budget_exhausted: output.budget_exhausted,
        new_contact_ids,
    })
}

/// Crawls several sites one after another; a failed site does not stop the batch
pub async fn crawl_sites(
    storage: &SharedStorage,
    crawler: &dyn SiteCrawler,
    extractor: &Extractor,
    site_ids: &[i64],
    snapshot_chars: usize,
) -> Result<CrawlBatchReport> {
    let mut report = CrawlBatchReport::default();

    for &site_id in site_ids {
        match run_site_crawl(storage, crawler, extractor, site_id, snapshot_chars).await {
            Ok(site_report) => {
                report.crawled += 1;
                report.new_contacts += site_report.new_contact_ids.len();
            }
            Err(OutreachError::Crawl(CrawlError::AlreadyCrawling(_))) => {
                tracing::warn!(site_id, "Skipping site already being crawled");
            }
            Err(OutreachError::Crawl(_)) => {
                report.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
