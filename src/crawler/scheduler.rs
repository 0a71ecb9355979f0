//! Frontier and page-budget bookkeeping for one site crawl
//!
//! This module handles:
//! - Breadth-first ordering of URLs to crawl
//! - The visited set (a URL is enqueued at most once)
//! - Page-slot reservation so in-flight fetches never overshoot `max_pages`
//! - Depth and same-site scope checks for discovered links

use crate::url::{is_same_site, normalize_in_scope};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone)]
pub struct QueuedUrl {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link distance from the root page (root is 0)
    pub depth: u32,

    /// Discovery order, used to keep the corpus deterministic
    pub seq: u64,
}

// Shallower URLs first, then discovery order (BinaryHeap is a max-heap)
impl Ord for QueuedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedUrl {}

/// Scheduler for a single site crawl
///
/// Invariants:
/// - `reserved + completed <= max_pages` at all times
/// - every URL in `visited` was pushed to the frontier at most once
pub struct CrawlScheduler {
    frontier: BinaryHeap<QueuedUrl>,
    visited: HashSet<String>,
    root: Url,
    root_host: String,
    max_pages: u32,
    max_depth: u32,
    reserved: u32,
    completed: u32,
    next_seq: u64,
}

impl CrawlScheduler {
    /// Creates a scheduler seeded with the (already normalized) root URL
    pub fn new(root: Url, max_pages: u32, max_depth: u32) -> Self {
        let root_host = root.host_str().unwrap_or_default().to_lowercase();

        let mut scheduler = Self {
            frontier: BinaryHeap::new(),
            visited: HashSet::new(),
            root: root.clone(),
            root_host,
            max_pages,
            max_depth,
            reserved: 0,
            completed: 0,
            next_seq: 0,
        };
        scheduler.push(root, 0);
        scheduler
    }

    fn push(&mut self, url: Url, depth: u32) -> bool {
        if !self.visited.insert(url.as_str().to_string()) {
            return false;
        }

        self.frontier.push(QueuedUrl {
            url,
            depth,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        true
    }

    /// Reserves a page slot and pops the next URL
    ///
    /// # Returns
    ///
    /// * `Some(QueuedUrl)` - A URL to fetch; its slot stays reserved until
    ///   [`complete`](Self::complete) or [`release`](Self::release)
    /// * `None` - The frontier is empty or the page budget is spoken for
    pub fn next(&mut self) -> Option<QueuedUrl> {
        if self.reserved + self.completed >= self.max_pages {
            return None;
        }

        let item = self.frontier.pop()?;
        self.reserved += 1;
        Some(item)
    }

    /// Records a fetched page and enqueues its in-scope links
    ///
    /// # Returns
    ///
    /// Number of newly enqueued URLs
    pub fn complete(&mut self, item: &QueuedUrl, links: impl IntoIterator<Item = Url>) -> usize {
        self.reserved = self.reserved.saturating_sub(1);
        self.completed += 1;

        if item.depth >= self.max_depth {
            return 0;
        }

        let mut added = 0;
        for link in links {
            let in_site = link
                .host_str()
                .map(|host| is_same_site(host, &self.root_host))
                .unwrap_or(false);
            if !in_site {
                continue;
            }

            let normalized = match normalize_in_scope(&link, &self.root) {
                Ok(url) => url,
                Err(_) => continue,
            };

            if self.push(normalized, item.depth + 1) {
                added += 1;
            }
        }
        added
    }

    /// Frees the slot of a failed fetch; the URL stays visited
    pub fn release(&mut self, _item: &QueuedUrl) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    pub fn pages_completed(&self) -> u32 {
        self.completed
    }

    pub fn in_flight(&self) -> u32 {
        self.reserved
    }

    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }
}
