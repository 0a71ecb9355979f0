//! Storage module for persisting pipeline records
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - Sites with their crawl signals and qualification flag
//! - Contacts with provenance, validation and outreach status
//! - The suppression list and the append-only send ledger
//! - Sender accounts, qualification rules, templates and review drafts

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::SenderEntry;
use crate::state::{
    DraftState, SendOutcome, SiteStatus, SourceType, SuppressionKind, SuppressionSource,
    ValidationStatus,
};
use crate::OutreachError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(OutreachError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, OutreachError> {
    SqliteStorage::new(path)
}

/// A registered website
#[derive(Debug, Clone)]
pub struct SiteRecord {
    pub id: i64,
    /// Lowercase host without `www.`
    pub domain: String,
    /// Canonical root URL the crawl starts from
    pub url: String,
    pub status: SiteStatus,
    pub attempts: u32,
    pub page_count: Option<u32>,
    pub word_count: Option<u64>,
    pub detected_platform: Option<String>,
    pub content_snapshot: Option<String>,
    pub title: Option<String>,
    pub qualified: bool,
    /// True once any contact on the site has a successful send
    pub contacted: bool,
    pub last_error: Option<String>,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Signals derived from a successful crawl
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSignals {
    pub page_count: u32,
    pub word_count: u64,
    pub detected_platform: Option<String>,
    pub content_snapshot: String,
    pub title: Option<String>,
}

/// A contact discovered on a site
#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub id: i64,
    pub site_id: i64,
    /// Lower-cased address; unique per site
    pub email: String,
    pub name: Option<String>,
    pub position: Option<String>,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub snippet: Option<String>,
    pub validation: ValidationStatus,
    pub validation_reason: Option<String>,
    pub validated_at: Option<DateTime<Utc>>,
    pub mx_host: Option<String>,
    pub priority: u8,
    pub contacted: bool,
    pub contact_count: u32,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A contact produced by the extractor, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewContact {
    pub email: String,
    pub name: Option<String>,
    pub position: Option<String>,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub snippet: Option<String>,
}

/// A blacklist entry
#[derive(Debug, Clone, PartialEq)]
pub struct SuppressionEntry {
    pub id: i64,
    pub kind: SuppressionKind,
    /// Lowercase email address or domain
    pub value: String,
    pub reason: Option<String>,
    pub source: SuppressionSource,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of the append-only send ledger
#[derive(Debug, Clone)]
pub struct SendAttempt {
    pub id: i64,
    pub contact_id: i64,
    pub site_id: i64,
    pub sender_id: Option<i64>,
    pub draft_id: Option<i64>,
    pub recipient_email: String,
    pub recipient_domain: String,
    pub subject: String,
    pub body: String,
    pub outcome: SendOutcome,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// A ledger row about to be appended
#[derive(Debug, Clone)]
pub struct NewSendAttempt {
    pub contact_id: i64,
    pub site_id: i64,
    pub sender_id: Option<i64>,
    pub draft_id: Option<i64>,
    pub recipient_email: String,
    pub recipient_domain: String,
    pub subject: String,
    pub body: String,
    pub outcome: SendOutcome,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// A mailbox the pipeline can send from
#[derive(Debug, Clone)]
pub struct SenderAccount {
    pub id: i64,
    pub name: String,
    pub from_address: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub username: Option<String>,
    pub daily_limit: u32,
    pub sent_today: u32,
    pub active: bool,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub disabled_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSenderAccount {
    pub name: String,
    pub from_address: String,
    pub daily_limit: u32,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub username: Option<String>,
}

impl From<&SenderEntry> for NewSenderAccount {
    fn from(entry: &SenderEntry) -> Self {
        Self {
            name: entry.name.clone(),
            from_address: entry.from_address.to_lowercase(),
            daily_limit: entry.daily_limit,
            smtp_host: entry.smtp_host.clone(),
            smtp_port: entry.smtp_port,
            username: entry.username.clone(),
        }
    }
}

/// A stored qualification rule; criteria are parsed by the evaluator
#[derive(Debug, Clone)]
pub struct RuleRecord {
    pub id: i64,
    pub name: String,
    pub criteria: serde_json::Map<String, serde_json::Value>,
    pub active: bool,
}

/// An email template
#[derive(Debug, Clone)]
pub struct TemplateRecord {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub preheader: Option<String>,
    pub use_ai: bool,
    pub ai_instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
    pub preheader: Option<String>,
    pub use_ai: bool,
    pub ai_instructions: Option<String>,
}

/// A generated email awaiting or past review
#[derive(Debug, Clone)]
pub struct DraftRecord {
    pub id: i64,
    pub contact_id: i64,
    pub site_id: i64,
    pub template_id: Option<i64>,
    pub sender_id: Option<i64>,
    pub subject: String,
    pub body: String,
    pub preheader: Option<String>,
    pub state: DraftState,
    pub priority: u8,
    pub ai_assisted: bool,
    pub notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDraft {
    pub contact_id: i64,
    pub site_id: i64,
    pub template_id: Option<i64>,
    pub subject: String,
    pub body: String,
    pub preheader: Option<String>,
    pub priority: u8,
    pub ai_assisted: bool,
    pub notes: Option<String>,
}
