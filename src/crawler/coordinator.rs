//! Crawl orchestrator - fetches the pages of one site
//!
//! This module contains the per-site crawl loop, including:
//! - Fetching the root page (a failure here fails the whole crawl)
//! - Running a bounded pool of fetch tasks over the shared scheduler
//! - Enforcing the wall-clock budget of a crawl
//! - Assembling the fetched pages into an ordered corpus

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::extract_links;
use crate::crawler::scheduler::{CrawlScheduler, QueuedUrl};
use crate::crawler::CrawlError;
use crate::url::normalize_in_scope;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use url::Url;

/// One page retrieved during a crawl
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: Url,
    pub depth: u32,
    pub body: String,
}

/// The result of crawling one site
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    /// Pages in discovery order, root first
    pub pages: Vec<CrawledPage>,

    /// True if the wall-clock budget ran out before the frontier drained
    pub budget_exhausted: bool,
}

impl CrawlOutput {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Concatenates page bodies, each preceded by a `<!-- page: URL -->` marker
    pub fn corpus(&self) -> String {
        let capacity = self
            .pages
            .iter()
            .map(|p| p.body.len() + p.url.as_str().len() + 16)
            .sum();
        let mut corpus = String::with_capacity(capacity);

        for page in &self.pages {
            corpus.push_str("<!-- page: ");
            corpus.push_str(page.url.as_str());
            corpus.push_str(" -->\n");
            corpus.push_str(&page.body);
            corpus.push('\n');
        }
        corpus
    }
}

/// A provider that returns the pages of a site
#[async_trait]
pub trait SiteCrawler: Send + Sync {
    async fn crawl_site(&self, root: &Url) -> Result<CrawlOutput, CrawlError>;
}

/// In-process crawler built on a [`PageFetcher`]
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    config: CrawlerConfig,
}

impl CrawlOrchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The page fetch collaborator
    /// * `config` - Page, depth, concurrency and time bounds
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: CrawlerConfig) -> Self {
        Self { fetcher, config }
    }

    fn spawn_fetch(
        &self,
        tasks: &mut JoinSet<Option<(u64, CrawledPage)>>,
        scheduler: &Arc<Mutex<CrawlScheduler>>,
        item: QueuedUrl,
    ) {
        let fetcher = Arc::clone(&self.fetcher);
        let scheduler = Arc::clone(scheduler);

        tasks.spawn(async move {
            match fetcher.fetch(&item.url).await {
                Ok(page) => {
                    let links = extract_links(&page.body, &page.final_url);
                    let added = scheduler.lock().complete(&item, links);
                    tracing::debug!(
                        url = %item.url,
                        depth = item.depth,
                        new_links = added,
                        "Fetched page"
                    );
                    Some((
                        item.seq,
                        CrawledPage {
                            url: item.url,
                            depth: item.depth,
                            body: page.body,
                        },
                    ))
                }
                Err(e) => {
                    tracing::debug!(url = %item.url, error = %e, "Skipping page");
                    scheduler.lock().release(&item);
                    None
                }
            }
        });
    }
}

#[async_trait]
impl SiteCrawler for CrawlOrchestrator {
    async fn crawl_site(&self, root: &Url) -> Result<CrawlOutput, CrawlError> {
        let root = normalize_in_scope(root, root)
            .map_err(|e| CrawlError::InvalidUrl(e.to_string()))?;
        let deadline = Instant::now() + Duration::from_secs(self.config.crawl_timeout_secs);

        let scheduler = Arc::new(Mutex::new(CrawlScheduler::new(
            root.clone(),
            self.config.max_pages,
            self.config.max_depth,
        )));

        let root_item = scheduler.lock().next().ok_or(CrawlError::NoPages)?;

        let root_page = match timeout_at(deadline, self.fetcher.fetch(&root_item.url)).await {
            Err(_) => return Err(CrawlError::Timeout),
            Ok(Err(source)) => {
                return Err(CrawlError::RootFetch {
                    url: root.to_string(),
                    source,
                })
            }
            Ok(Ok(page)) => page,
        };

        let links = extract_links(&root_page.body, &root_page.final_url);
        scheduler.lock().complete(&root_item, links);

        let mut pages: Vec<(u64, CrawledPage)> = vec![(
            root_item.seq,
            CrawledPage {
                url: root_item.url,
                depth: 0,
                body: root_page.body,
            },
        )];

        let max_in_flight = self.config.max_concurrent_fetches.max(1) as usize;
        let mut tasks = JoinSet::new();
        let mut budget_exhausted = false;

        loop {
            while tasks.len() < max_in_flight {
                let next = scheduler.lock().next();
                match next {
                    Some(item) => self.spawn_fetch(&mut tasks, &scheduler, item),
                    None => break,
                }
            }

            if tasks.is_empty() {
                break;
            }

            match timeout_at(deadline, tasks.join_next()).await {
                Err(_) => {
                    tracing::warn!(
                        root = %root,
                        pages = pages.len(),
                        "Crawl time budget exhausted, abandoning in-flight fetches"
                    );
                    budget_exhausted = true;
                    tasks.abort_all();
                    break;
                }
                Ok(None) => break,
                Ok(Some(Ok(Some(page)))) => pages.push(page),
                Ok(Some(Ok(None))) => {}
                Ok(Some(Err(e))) => {
                    tracing::warn!(root = %root, error = %e, "Fetch task ended abnormally");
                }
            }
        }

        pages.sort_by_key(|(seq, _)| *seq);

        Ok(CrawlOutput {
            pages: pages.into_iter().map(|(_, page)| page).collect(),
            budget_exhausted,
        })
    }
}
