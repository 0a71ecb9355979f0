use crate::config::defaults;
use serde::Deserialize;

/// Main configuration structure for the outreach pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub suppression: SuppressionConfig,
    #[serde(default)]
    pub sending: SendingConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub ai: Option<AiConfig>,
    #[serde(default, rename = "hosted-crawler")]
    pub hosted_crawler: Option<HostedCrawlerConfig>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
    #[serde(default)]
    pub senders: Vec<SenderEntry>,
}

/// Crawl bounds and fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of pages fetched per site (root included)
    pub max_pages: u32,

    /// Maximum link depth followed from the root page (root is depth 0)
    pub max_depth: u32,

    /// Maximum number of page fetches in flight for one site
    pub max_concurrent_fetches: u32,

    /// Timeout for a single page fetch (seconds)
    pub request_timeout_secs: u64,

    /// Wall-clock budget for a whole site crawl (seconds)
    pub crawl_timeout_secs: u64,

    /// Maximum length of the stored content snapshot (characters)
    pub snapshot_chars: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            max_depth: 2,
            max_concurrent_fetches: 4,
            request_timeout_secs: 15,
            crawl_timeout_secs: 120,
            snapshot_chars: 50_000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Record store location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// Coarse classification of a page by its URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Contact,
    About,
    Team,
    Services,
    Careers,
    Blog,
    Faq,
    Privacy,
    Terms,
}

/// One row of the page-type table: URL keywords that identify a page type
#[derive(Debug, Clone, Deserialize)]
pub struct PageTypeEntry {
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub keywords: Vec<String>,
}

/// Markers that identify a site builder / CMS in page source
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSignature {
    pub name: String,
    pub markers: Vec<String>,
}

/// Heuristic tables used by the content and contact extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Ordered name patterns; each must define a `name` capture group
    pub name_patterns: Vec<String>,

    /// Ordered job titles; the first one found near an address wins
    pub position_titles: Vec<String>,

    /// Page-type table consulted in order
    pub page_types: Vec<PageTypeEntry>,

    /// URL substrings that mark a header source
    pub header_markers: Vec<String>,

    /// URL substrings that mark a footer source
    pub footer_markers: Vec<String>,

    /// File extensions that disqualify an email-shaped match
    pub blocked_extensions: Vec<String>,

    /// Characters of text taken on each side of an address for inference
    pub context_chars: usize,

    /// Maximum length of the stored provenance snippet
    pub snippet_chars: usize,

    /// Platform fingerprints consulted in order
    pub platform_signatures: Vec<PlatformSignature>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            name_patterns: defaults::name_patterns(),
            position_titles: defaults::position_titles(),
            page_types: defaults::page_types(),
            header_markers: vec!["header".to_string(), "masthead".to_string()],
            footer_markers: vec!["footer".to_string(), "colofon".to_string()],
            blocked_extensions: defaults::blocked_extensions(),
            context_chars: 150,
            snippet_chars: 200,
            platform_signatures: defaults::platform_signatures(),
        }
    }
}

/// Email validation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ValidationConfig {
    /// Domains of throwaway mailbox providers (replaces the built-in list)
    pub disposable_domains: Vec<String>,

    /// Extra disposable domains appended to the list above
    pub extra_disposable_domains: Vec<String>,

    /// Timeout for one DNS lookup (seconds)
    pub dns_timeout_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            disposable_domains: defaults::disposable_domains(),
            extra_disposable_domains: Vec::new(),
            dns_timeout_secs: 5,
        }
    }
}

/// Duplicate-prevention windows
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SuppressionConfig {
    /// A contact with a successful send in this many days is blocked
    pub contact_cooldown_days: i64,

    /// Window for the per-site and per-domain caps (days)
    pub site_window_days: i64,

    /// Successful sends to one site allowed within the window
    pub site_max_sends: u64,

    /// Successful sends to one email domain allowed within the window
    pub domain_max_sends: u64,

    /// Leave the checked contact's own sends out of its domain count
    pub exclude_self_from_domain_count: bool,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            contact_cooldown_days: 90,
            site_window_days: 30,
            site_max_sends: 3,
            domain_max_sends: 2,
            exclude_self_from_domain_count: false,
        }
    }
}

/// Sending window, sender health and dispatch timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SendingConfig {
    /// First hour (inclusive) of the daily sending window
    pub window_start_hour: u32,

    /// Hour (exclusive) at which the sending window closes
    pub window_end_hour: u32,

    /// Fixed UTC offset the window is evaluated in
    pub utc_offset_hours: i32,

    /// Success rate below which an account is unhealthy
    pub health_threshold: f64,

    /// Attempts an account needs before the health sweep judges it
    pub min_health_samples: u64,

    /// Timeout for one mail dispatch (seconds)
    pub send_timeout_secs: u64,
}

impl Default for SendingConfig {
    fn default() -> Self {
        Self {
            window_start_hour: 8,
            window_end_hour: 17,
            utc_offset_hours: 0,
            health_threshold: 0.70,
            min_health_samples: 0,
            send_timeout_secs: 30,
        }
    }
}

/// Review queue escalation and retention
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReviewConfig {
    /// Terminal drafts older than this are purged by cleanup
    pub retention_days: i64,

    /// Priority of a draft no escalation rule applies to
    pub base_priority: u8,

    /// Contact priority at or above which a draft is escalated
    pub contact_priority_threshold: u8,

    /// Priority floor for high-priority contacts
    pub contact_priority_floor: u8,

    /// Priority floor for sites never contacted before
    pub uncontacted_site_floor: u8,

    /// Priority floor for AI-assisted drafts
    pub ai_assisted_floor: u8,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            base_priority: 50,
            contact_priority_threshold: 75,
            contact_priority_floor: 75,
            uncontacted_site_floor: 60,
            ai_assisted_floor: 70,
        }
    }
}

/// Draft composition settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ComposeConfig {
    /// Maximum site content excerpt handed to text generation
    pub max_excerpt_chars: usize,

    /// Timeout for one text generation call (seconds)
    pub generation_timeout_secs: u64,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_excerpt_chars: 4_000,
            generation_timeout_secs: 30,
        }
    }
}

/// OpenAI-compatible text generation endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

/// Hosted crawl-as-a-service endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostedCrawlerConfig {
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_polls() -> u32 {
    60
}

/// A qualification rule seeded from the config file
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    pub name: String,
    /// Criterion name -> parameters, loosely typed
    pub criteria: serde_json::Map<String, serde_json::Value>,
}

/// A sender account seeded from the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SenderEntry {
    pub name: String,
    pub from_address: String,
    pub daily_limit: u32,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
}
