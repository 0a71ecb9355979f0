/// Crawl lifecycle states for a registered site
use std::fmt;

/// Represents where a site is in its crawl lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteStatus {
    /// Registered, never crawled (or requeued for a recrawl)
    Pending,

    /// A crawl is in progress
    Crawling,

    /// The last crawl retrieved at least one page
    Completed,

    /// The last crawl failed on the root page or retrieved nothing
    Failed,
}

impl SiteStatus {
    /// Returns true if the site's derived signals can be trusted
    pub fn has_signals(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if a crawl may be started from this state
    ///
    /// A site already crawling is skipped so two workers never crawl the
    /// same site at once.
    pub fn can_start_crawl(&self) -> bool {
        !matches!(self, Self::Crawling)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "crawling" => Some(Self::Crawling),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all site states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Crawling, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
