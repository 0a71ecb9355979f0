//! Content and contact extraction
//!
//! Two independent passes over a crawl corpus:
//! - a structural summary (title, headings, paragraphs, links, images, words)
//! - contact discovery (addresses with inferred name, position and source)

mod contacts;
mod heuristics;
mod summary;

pub use contacts::{split_corpus, ContactDiscovery, CorpusPage};
pub use heuristics::{detect_platform, ContactHeuristics, NamePattern};
pub use summary::{summarize, visible_text, Heading, ImageInfo, LinkInfo, PageSummary};

use crate::config::{ExtractionConfig, PlatformSignature};
use crate::storage::{CrawlSignals, NewContact};
use crate::ConfigError;
use std::collections::HashSet;

/// The extractor, built once from its configuration tables
pub struct Extractor {
    heuristics: ContactHeuristics,
    discovery: ContactDiscovery,
    platform_signatures: Vec<PlatformSignature>,
}

impl Extractor {
    /// Compiles the configured patterns
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - Ready to use
    /// * `Err(ConfigError)` - A name pattern or title failed to compile
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            heuristics: ContactHeuristics::new(config)?,
            discovery: ContactDiscovery::new(
                &config.blocked_extensions,
                config.context_chars,
                config.snippet_chars,
            )?,
            platform_signatures: config.platform_signatures.clone(),
        })
    }

    pub fn summarize(&self, corpus: &str) -> PageSummary {
        summarize(corpus)
    }

    /// Platform of the first page that reveals one
    pub fn detect_platform(&self, corpus: &str) -> Option<String> {
        split_corpus(corpus)
            .iter()
            .find_map(|page| detect_platform(page.html, &self.platform_signatures))
    }

    /// Contacts in the corpus that are not in `known`
    pub fn discover_contacts(&self, corpus: &str, known: &HashSet<String>) -> Vec<NewContact> {
        self.discovery.discover(corpus, &self.heuristics, known)
    }

    /// Derives the signals stored on a site after a successful crawl
    ///
    /// The snapshot holds each page's URL followed by its visible text, so
    /// URL and keyword criteria can both be checked against it.
    pub fn crawl_signals(&self, corpus: &str, page_count: u32, snapshot_chars: usize) -> CrawlSignals {
        let summary = summarize(corpus);

        let mut snapshot = String::new();
        for page in split_corpus(corpus) {
            if let Some(url) = page.url {
                snapshot.push_str(url);
                snapshot.push('\n');
            }
            snapshot.push_str(&visible_text(page.html));
            snapshot.push_str("\n\n");
        }
        let content_snapshot: String = snapshot.trim_end().chars().take(snapshot_chars).collect();

        CrawlSignals {
            page_count,
            word_count: summary.word_count,
            detected_platform: self.detect_platform(corpus),
            content_snapshot,
            title: summary.title,
        }
    }
}
