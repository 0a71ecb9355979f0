//! Outreach pipeline: crawl, qualify and contact websites safely
//!
//! This crate turns a raw website crawl into policy-compliant outreach email:
//! it crawls a site, extracts contacts, qualifies the site against business
//! rules, validates addresses, gates every send through suppression, sender
//! rotation and a sending window, and holds drafts in a human review queue.

pub mod compose;
pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod extract;
pub mod output;
pub mod qualification;
pub mod review;
pub mod schedule;
pub mod sender;
pub mod state;
pub mod storage;
pub mod suppression;
pub mod url;
pub mod validation;

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Main error type for the outreach pipeline
#[derive(Debug, Error)]
pub enum OutreachError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Crawl error: {0}")]
    Crawl(#[from] crawler::CrawlError),

    #[error("Qualification rule error: {0}")]
    Criterion(#[from] qualification::CriterionError),

    #[error("Review error: {0}")]
    Review(#[from] review::ReviewError),

    #[error("Compose error: {0}")]
    Compose(#[from] compose::ComposeError),

    #[error("Suppression import error: {0}")]
    Import(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain: {0}")]
    InvalidPattern(String),

    #[error("Invalid extraction pattern '{pattern}': {message}")]
    Regex { pattern: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, OutreachError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// The record store shared between engines
pub type SharedStorage = Arc<Mutex<storage::SqliteStorage>>;

/// Locks the shared record store, mapping poisoning to an error
pub fn lock_storage(storage: &SharedStorage) -> Result<MutexGuard<'_, storage::SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| OutreachError::LockPoisoned("record store"))
}

// Re-export commonly used types
pub use config::Config;
pub use state::{DraftState, SiteStatus, SourceType, ValidationStatus};
pub use url::{extract_domain, normalize_url};
