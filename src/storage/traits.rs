//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{
    DraftState, SendOutcome, SiteStatus, SuppressionKind, SuppressionSource, ValidationStatus,
};
use crate::storage::{
    ContactRecord, CrawlSignals, DraftRecord, NewContact, NewDraft, NewSendAttempt,
    NewSenderAccount, NewTemplate, RuleRecord, SendAttempt, SenderAccount, SiteRecord,
    SuppressionEntry, TemplateRecord,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every read and write the pipeline engines need.
/// State-machine rules live in the engines; the store only persists.
pub trait Storage {
    // ===== Sites =====

    /// Registers a site or returns the ID of the existing one
    ///
    /// # Arguments
    ///
    /// * `domain` - Lowercase domain without `www.`
    /// * `url` - Canonical root URL
    fn insert_site(&mut self, domain: &str, url: &str) -> StorageResult<i64>;

    fn get_site(&self, site_id: i64) -> StorageResult<Option<SiteRecord>>;

    fn get_site_by_domain(&self, domain: &str) -> StorageResult<Option<SiteRecord>>;

    /// Lists sites, optionally filtered by crawl status, oldest first
    fn list_sites(&self, status: Option<SiteStatus>) -> StorageResult<Vec<SiteRecord>>;

    /// Moves a site to `crawling` and increments its attempt counter
    fn mark_site_crawling(&mut self, site_id: i64) -> StorageResult<()>;

    /// Moves a site to `completed` and stores its derived signals
    fn complete_site_crawl(&mut self, site_id: i64, signals: &CrawlSignals) -> StorageResult<()>;

    /// Moves a site to `failed` and stores the reason; attempts are retained
    fn fail_site_crawl(&mut self, site_id: i64, error: &str) -> StorageResult<()>;

    fn set_site_qualified(&mut self, site_id: i64, qualified: bool) -> StorageResult<()>;

    fn mark_site_contacted(&mut self, site_id: i64) -> StorageResult<()>;

    // ===== Contacts =====

    /// Inserts a contact unless (site, email) already exists
    ///
    /// # Returns
    ///
    /// * `Some(id)` - The contact was new
    /// * `None` - The site already had this address
    fn insert_contact(&mut self, site_id: i64, contact: &NewContact) -> StorageResult<Option<i64>>;

    fn get_contact(&self, contact_id: i64) -> StorageResult<Option<ContactRecord>>;

    /// Lower-cased addresses already stored for a site
    fn contact_emails_for_site(&self, site_id: i64) -> StorageResult<HashSet<String>>;

    fn list_contacts_for_site(&self, site_id: i64) -> StorageResult<Vec<ContactRecord>>;

    fn list_contacts_by_validation(
        &self,
        status: ValidationStatus,
    ) -> StorageResult<Vec<ContactRecord>>;

    fn update_contact_validation(
        &mut self,
        contact_id: i64,
        status: ValidationStatus,
        reason: Option<&str>,
        mx_host: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    fn set_contact_priority(&mut self, contact_id: i64, priority: u8) -> StorageResult<()>;

    /// Marks a contact as contacted and bumps its contact counter
    fn record_contact_outreach(&mut self, contact_id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    // ===== Suppression list =====

    /// Adds an entry, or reactivates and updates the existing one
    fn upsert_suppression(
        &mut self,
        kind: SuppressionKind,
        value: &str,
        reason: Option<&str>,
        source: SuppressionSource,
    ) -> StorageResult<i64>;

    /// Returns true if an entry was deleted
    fn delete_suppression(&mut self, kind: SuppressionKind, value: &str) -> StorageResult<bool>;

    /// Returns true if an entry was updated
    fn set_suppression_active(
        &mut self,
        kind: SuppressionKind,
        value: &str,
        active: bool,
    ) -> StorageResult<bool>;

    fn find_active_suppression(
        &self,
        kind: SuppressionKind,
        value: &str,
    ) -> StorageResult<Option<SuppressionEntry>>;

    fn list_suppressions(&self, active_only: bool) -> StorageResult<Vec<SuppressionEntry>>;

    // ===== Send ledger (append-only) =====

    fn append_send_attempt(&mut self, attempt: &NewSendAttempt) -> StorageResult<i64>;

    /// Successful sends to a contact at or after `since`
    fn count_sent_to_contact_since(
        &self,
        contact_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Successful sends to any contact of a site at or after `since`
    fn count_sent_to_site_since(&self, site_id: i64, since: DateTime<Utc>) -> StorageResult<u64>;

    /// Successful sends to an email domain at or after `since`
    ///
    /// # Arguments
    ///
    /// * `exclude_contact` - Leave this contact's own sends out of the count
    fn count_sent_to_domain_since(
        &self,
        domain: &str,
        since: DateTime<Utc>,
        exclude_contact: Option<i64>,
    ) -> StorageResult<u64>;

    fn list_send_attempts_for_contact(&self, contact_id: i64) -> StorageResult<Vec<SendAttempt>>;

    // ===== Sender accounts =====

    fn insert_sender(&mut self, sender: &NewSenderAccount) -> StorageResult<i64>;

    /// All accounts ordered by ID
    fn list_senders(&self) -> StorageResult<Vec<SenderAccount>>;

    fn get_sender(&self, sender_id: i64) -> StorageResult<Option<SenderAccount>>;

    /// Increments `sent_today` only while the account is active and below capacity
    ///
    /// # Returns
    ///
    /// True if the counter was incremented
    fn increment_sent_today(&mut self, sender_id: i64) -> StorageResult<bool>;

    /// Records one dispatch outcome and the last-used time
    fn record_sender_outcome(
        &mut self,
        sender_id: i64,
        success: bool,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    fn deactivate_sender(&mut self, sender_id: i64, reason: &str) -> StorageResult<()>;

    /// Zeroes `sent_today` for every account, returning how many were reset
    fn reset_daily_counts(&mut self) -> StorageResult<usize>;

    // ===== Qualification rules =====

    /// Inserts a rule or replaces the criteria of the rule with that name
    fn upsert_rule(
        &mut self,
        name: &str,
        criteria: &serde_json::Map<String, serde_json::Value>,
    ) -> StorageResult<i64>;

    fn list_rules(&self, active_only: bool) -> StorageResult<Vec<RuleRecord>>;

    // ===== Templates =====

    fn insert_template(&mut self, template: &NewTemplate) -> StorageResult<i64>;

    fn get_template(&self, template_id: i64) -> StorageResult<Option<TemplateRecord>>;

    fn get_template_by_name(&self, name: &str) -> StorageResult<Option<TemplateRecord>>;

    // ===== Review drafts =====

    fn insert_draft(&mut self, draft: &NewDraft) -> StorageResult<i64>;

    fn get_draft(&self, draft_id: i64) -> StorageResult<Option<DraftRecord>>;

    fn update_draft_content(
        &mut self,
        draft_id: i64,
        subject: &str,
        body: &str,
        preheader: Option<&str>,
    ) -> StorageResult<()>;

    fn set_draft_state(&mut self, draft_id: i64, state: DraftState) -> StorageResult<()>;

    /// Stores a review decision
    fn set_draft_review(
        &mut self,
        draft_id: i64,
        state: DraftState,
        reviewer: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Stores a dispatch outcome
    fn set_draft_dispatch(
        &mut self,
        draft_id: i64,
        state: DraftState,
        sender_id: Option<i64>,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Appends to the free-text notes, separated by "; "
    fn append_draft_note(&mut self, draft_id: i64, note: &str) -> StorageResult<()>;

    /// Lists drafts by priority (highest first), then age (oldest first)
    fn list_drafts(
        &self,
        state: Option<DraftState>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<DraftRecord>>;

    /// Deletes rejected/sent/failed drafts last touched before `cutoff`
    fn delete_terminal_drafts_before(&mut self, cutoff: DateTime<Utc>) -> StorageResult<usize>;

    // ===== Statistics =====

    fn count_sites_by_status(&self) -> StorageResult<HashMap<SiteStatus, u64>>;

    fn count_qualified_sites(&self) -> StorageResult<u64>;

    fn count_contacts_by_validation(&self) -> StorageResult<HashMap<ValidationStatus, u64>>;

    fn count_drafts_by_state(&self) -> StorageResult<HashMap<DraftState, u64>>;

    fn count_send_attempts(&self, outcome: SendOutcome) -> StorageResult<u64>;

    fn count_active_suppressions(&self) -> StorageResult<u64>;
}
