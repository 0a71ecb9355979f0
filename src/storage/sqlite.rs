//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{
    DraftState, SendOutcome, SiteStatus, SourceType, SuppressionKind, SuppressionSource,
    ValidationStatus,
};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    ContactRecord, CrawlSignals, DraftRecord, NewContact, NewDraft, NewSendAttempt,
    NewSenderAccount, NewTemplate, RuleRecord, SendAttempt, SenderAccount, SiteRecord,
    SuppressionEntry, TemplateRecord,
};
use crate::OutreachError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(OutreachError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, OutreachError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, OutreachError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Formats a timestamp as fixed-width RFC 3339 (UTC, microseconds)
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_ts(idx, &raw))
        .transpose()
}

fn get_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

const SITE_COLUMNS: &str = "id, domain, url, status, attempts, page_count, word_count,
     detected_platform, content_snapshot, title, qualified, contacted, last_error,
     last_crawled_at, created_at";

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        domain: row.get(1)?,
        url: row.get(2)?,
        status: SiteStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(SiteStatus::Pending),
        attempts: row.get(4)?,
        page_count: row.get(5)?,
        word_count: row.get::<_, Option<i64>>(6)?.map(|n| n.max(0) as u64),
        detected_platform: row.get(7)?,
        content_snapshot: row.get(8)?,
        title: row.get(9)?,
        qualified: row.get(10)?,
        contacted: row.get(11)?,
        last_error: row.get(12)?,
        last_crawled_at: get_opt_ts(row, 13)?,
        created_at: get_ts(row, 14)?,
    })
}

const CONTACT_COLUMNS: &str = "id, site_id, email, name, position, source_type, source_url,
     snippet, validation, validation_reason, validated_at, mx_host, priority, contacted,
     contact_count, last_contacted_at, created_at";

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRecord> {
    Ok(ContactRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        position: row.get(4)?,
        source_type: SourceType::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(SourceType::Body),
        source_url: row.get(6)?,
        snippet: row.get(7)?,
        validation: ValidationStatus::from_db_string(&row.get::<_, String>(8)?)
            .unwrap_or(ValidationStatus::Unvalidated),
        validation_reason: row.get(9)?,
        validated_at: get_opt_ts(row, 10)?,
        mx_host: row.get(11)?,
        priority: row.get(12)?,
        contacted: row.get(13)?,
        contact_count: row.get(14)?,
        last_contacted_at: get_opt_ts(row, 15)?,
        created_at: get_ts(row, 16)?,
    })
}

const SUPPRESSION_COLUMNS: &str = "id, kind, value, reason, source, active, created_at";

fn suppression_from_row(row: &Row<'_>) -> rusqlite::Result<SuppressionEntry> {
    Ok(SuppressionEntry {
        id: row.get(0)?,
        kind: SuppressionKind::from_db_string(&row.get::<_, String>(1)?)
            .unwrap_or(SuppressionKind::Email),
        value: row.get(2)?,
        reason: row.get(3)?,
        source: SuppressionSource::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(SuppressionSource::Manual),
        active: row.get(5)?,
        created_at: get_ts(row, 6)?,
    })
}

const ATTEMPT_COLUMNS: &str = "id, contact_id, site_id, sender_id, draft_id, recipient_email,
     recipient_domain, subject, body, outcome, error, attempted_at";

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<SendAttempt> {
    Ok(SendAttempt {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        site_id: row.get(2)?,
        sender_id: row.get(3)?,
        draft_id: row.get(4)?,
        recipient_email: row.get(5)?,
        recipient_domain: row.get(6)?,
        subject: row.get(7)?,
        body: row.get(8)?,
        outcome: SendOutcome::from_db_string(&row.get::<_, String>(9)?)
            .unwrap_or(SendOutcome::Failed),
        error: row.get(10)?,
        attempted_at: get_ts(row, 11)?,
    })
}

const SENDER_COLUMNS: &str = "id, name, from_address, smtp_host, smtp_port, username,
     daily_limit, sent_today, active, success_count, failure_count, last_used_at,
     disabled_reason";

fn sender_from_row(row: &Row<'_>) -> rusqlite::Result<SenderAccount> {
    Ok(SenderAccount {
        id: row.get(0)?,
        name: row.get(1)?,
        from_address: row.get(2)?,
        smtp_host: row.get(3)?,
        smtp_port: row.get(4)?,
        username: row.get(5)?,
        daily_limit: row.get(6)?,
        sent_today: row.get(7)?,
        active: row.get(8)?,
        success_count: get_u64(row, 9)?,
        failure_count: get_u64(row, 10)?,
        last_used_at: get_opt_ts(row, 11)?,
        disabled_reason: row.get(12)?,
    })
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<RuleRecord> {
    let raw: String = row.get(2)?;
    let criteria = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(RuleRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        criteria,
        active: row.get(3)?,
    })
}

const TEMPLATE_COLUMNS: &str = "id, name, subject, body, preheader, use_ai, ai_instructions";

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<TemplateRecord> {
    Ok(TemplateRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        preheader: row.get(4)?,
        use_ai: row.get(5)?,
        ai_instructions: row.get(6)?,
    })
}

const DRAFT_COLUMNS: &str = "id, contact_id, site_id, template_id, sender_id, subject, body,
     preheader, state, priority, ai_assisted, notes, reviewed_by, reviewed_at, sent_at,
     last_error, created_at";

fn draft_from_row(row: &Row<'_>) -> rusqlite::Result<DraftRecord> {
    Ok(DraftRecord {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        site_id: row.get(2)?,
        template_id: row.get(3)?,
        sender_id: row.get(4)?,
        subject: row.get(5)?,
        body: row.get(6)?,
        preheader: row.get(7)?,
        state: DraftState::from_db_string(&row.get::<_, String>(8)?)
            .unwrap_or(DraftState::Pending),
        priority: row.get(9)?,
        ai_assisted: row.get(10)?,
        notes: row.get(11)?,
        reviewed_by: row.get(12)?,
        reviewed_at: get_opt_ts(row, 13)?,
        sent_at: get_opt_ts(row, 14)?,
        last_error: row.get(15)?,
        created_at: get_ts(row, 16)?,
    })
}

impl SqliteStorage {
    fn count_grouped(&self, sql: &str) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, get_u64(row, 1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Storage for SqliteStorage {
    // ===== Sites =====

    fn insert_site(&mut self, domain: &str, url: &str) -> StorageResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM sites WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO sites (domain, url, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                domain,
                url,
                SiteStatus::Pending.to_db_string(),
                ts(Utc::now())
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_site(&self, site_id: i64) -> StorageResult<Option<SiteRecord>> {
        let sql = format!("SELECT {} FROM sites WHERE id = ?1", SITE_COLUMNS);
        let site = self
            .conn
            .query_row(&sql, params![site_id], site_from_row)
            .optional()?;
        Ok(site)
    }

    fn get_site_by_domain(&self, domain: &str) -> StorageResult<Option<SiteRecord>> {
        let sql = format!("SELECT {} FROM sites WHERE domain = ?1", SITE_COLUMNS);
        let site = self
            .conn
            .query_row(&sql, params![domain], site_from_row)
            .optional()?;
        Ok(site)
    }

    fn list_sites(&self, status: Option<SiteStatus>) -> StorageResult<Vec<SiteRecord>> {
        let sql = format!(
            "SELECT {} FROM sites WHERE (?1 IS NULL OR status = ?1) ORDER BY id",
            SITE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sites = stmt
            .query_map(params![status.map(|s| s.to_db_string())], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn mark_site_crawling(&mut self, site_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sites SET status = ?1, attempts = attempts + 1 WHERE id = ?2",
            params![SiteStatus::Crawling.to_db_string(), site_id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("Site ID {}", site_id)));
        }
        Ok(())
    }

    fn complete_site_crawl(&mut self, site_id: i64, signals: &CrawlSignals) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET status = ?1, page_count = ?2, word_count = ?3,
             detected_platform = ?4, content_snapshot = ?5, title = ?6,
             last_error = NULL, last_crawled_at = ?7
             WHERE id = ?8",
            params![
                SiteStatus::Completed.to_db_string(),
                signals.page_count,
                signals.word_count as i64,
                signals.detected_platform,
                signals.content_snapshot,
                signals.title,
                ts(Utc::now()),
                site_id
            ],
        )?;
        Ok(())
    }

    fn fail_site_crawl(&mut self, site_id: i64, error: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET status = ?1, last_error = ?2, last_crawled_at = ?3 WHERE id = ?4",
            params![
                SiteStatus::Failed.to_db_string(),
                error,
                ts(Utc::now()),
                site_id
            ],
        )?;
        Ok(())
    }

    fn set_site_qualified(&mut self, site_id: i64, qualified: bool) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET qualified = ?1 WHERE id = ?2",
            params![qualified, site_id],
        )?;
        Ok(())
    }

    fn mark_site_contacted(&mut self, site_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET contacted = 1 WHERE id = ?1",
            params![site_id],
        )?;
        Ok(())
    }

    // ===== Contacts =====

    fn insert_contact(&mut self, site_id: i64, contact: &NewContact) -> StorageResult<Option<i64>> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO contacts
             (site_id, email, name, position, source_type, source_url, snippet, validation, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                site_id,
                contact.email.to_lowercase(),
                contact.name,
                contact.position,
                contact.source_type.to_db_string(),
                contact.source_url,
                contact.snippet,
                ValidationStatus::Unvalidated.to_db_string(),
                ts(Utc::now())
            ],
        )?;

        if changed == 0 {
            Ok(None)
        } else {
            Ok(Some(self.conn.last_insert_rowid()))
        }
    }

    fn get_contact(&self, contact_id: i64) -> StorageResult<Option<ContactRecord>> {
        let sql = format!("SELECT {} FROM contacts WHERE id = ?1", CONTACT_COLUMNS);
        let contact = self
            .conn
            .query_row(&sql, params![contact_id], contact_from_row)
            .optional()?;
        Ok(contact)
    }

    fn contact_emails_for_site(&self, site_id: i64) -> StorageResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT email FROM contacts WHERE site_id = ?1")?;
        let emails = stmt
            .query_map(params![site_id], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(emails)
    }

    fn list_contacts_for_site(&self, site_id: i64) -> StorageResult<Vec<ContactRecord>> {
        let sql = format!(
            "SELECT {} FROM contacts WHERE site_id = ?1 ORDER BY id",
            CONTACT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let contacts = stmt
            .query_map(params![site_id], contact_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    fn list_contacts_by_validation(
        &self,
        status: ValidationStatus,
    ) -> StorageResult<Vec<ContactRecord>> {
        let sql = format!(
            "SELECT {} FROM contacts WHERE validation = ?1 ORDER BY id",
            CONTACT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let contacts = stmt
            .query_map(params![status.to_db_string()], contact_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    fn update_contact_validation(
        &mut self,
        contact_id: i64,
        status: ValidationStatus,
        reason: Option<&str>,
        mx_host: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE contacts SET validation = ?1, validation_reason = ?2, mx_host = ?3,
             validated_at = ?4 WHERE id = ?5",
            params![status.to_db_string(), reason, mx_host, ts(at), contact_id],
        )?;
        Ok(())
    }

    fn set_contact_priority(&mut self, contact_id: i64, priority: u8) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE contacts SET priority = ?1 WHERE id = ?2",
            params![priority.min(100), contact_id],
        )?;
        Ok(())
    }

    fn record_contact_outreach(&mut self, contact_id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE contacts SET contacted = 1, contact_count = contact_count + 1,
             last_contacted_at = ?1 WHERE id = ?2",
            params![ts(at), contact_id],
        )?;
        Ok(())
    }

    // ===== Suppression list =====

    fn upsert_suppression(
        &mut self,
        kind: SuppressionKind,
        value: &str,
        reason: Option<&str>,
        source: SuppressionSource,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO suppressions (kind, value, reason, source, active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)
             ON CONFLICT(kind, value) DO UPDATE SET
                reason = excluded.reason,
                source = excluded.source,
                active = 1",
            params![
                kind.to_db_string(),
                value,
                reason,
                source.to_db_string(),
                ts(Utc::now())
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM suppressions WHERE kind = ?1 AND value = ?2",
            params![kind.to_db_string(), value],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn delete_suppression(&mut self, kind: SuppressionKind, value: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM suppressions WHERE kind = ?1 AND value = ?2",
            params![kind.to_db_string(), value],
        )?;
        Ok(changed > 0)
    }

    fn set_suppression_active(
        &mut self,
        kind: SuppressionKind,
        value: &str,
        active: bool,
    ) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE suppressions SET active = ?1 WHERE kind = ?2 AND value = ?3",
            params![active, kind.to_db_string(), value],
        )?;
        Ok(changed > 0)
    }

    fn find_active_suppression(
        &self,
        kind: SuppressionKind,
        value: &str,
    ) -> StorageResult<Option<SuppressionEntry>> {
        let sql = format!(
            "SELECT {} FROM suppressions WHERE kind = ?1 AND value = ?2 AND active = 1",
            SUPPRESSION_COLUMNS
        );
        let entry = self
            .conn
            .query_row(&sql, params![kind.to_db_string(), value], suppression_from_row)
            .optional()?;
        Ok(entry)
    }

    fn list_suppressions(&self, active_only: bool) -> StorageResult<Vec<SuppressionEntry>> {
        let sql = format!(
            "SELECT {} FROM suppressions WHERE (?1 = 0 OR active = 1) ORDER BY kind, value",
            SUPPRESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![active_only], suppression_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ===== Send ledger =====

    fn append_send_attempt(&mut self, attempt: &NewSendAttempt) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO send_attempts
             (contact_id, site_id, sender_id, draft_id, recipient_email, recipient_domain,
              subject, body, outcome, error, attempted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                attempt.contact_id,
                attempt.site_id,
                attempt.sender_id,
                attempt.draft_id,
                attempt.recipient_email,
                attempt.recipient_domain,
                attempt.subject,
                attempt.body,
                attempt.outcome.to_db_string(),
                attempt.error,
                ts(attempt.attempted_at)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn count_sent_to_contact_since(
        &self,
        contact_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM send_attempts
             WHERE contact_id = ?1 AND outcome = ?2 AND attempted_at >= ?3",
            params![contact_id, SendOutcome::Sent.to_db_string(), ts(since)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_sent_to_site_since(&self, site_id: i64, since: DateTime<Utc>) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM send_attempts
             WHERE site_id = ?1 AND outcome = ?2 AND attempted_at >= ?3",
            params![site_id, SendOutcome::Sent.to_db_string(), ts(since)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_sent_to_domain_since(
        &self,
        domain: &str,
        since: DateTime<Utc>,
        exclude_contact: Option<i64>,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM send_attempts
             WHERE recipient_domain = ?1 AND outcome = ?2 AND attempted_at >= ?3
               AND (?4 IS NULL OR contact_id != ?4)",
            params![
                domain,
                SendOutcome::Sent.to_db_string(),
                ts(since),
                exclude_contact
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_send_attempts_for_contact(&self, contact_id: i64) -> StorageResult<Vec<SendAttempt>> {
        let sql = format!(
            "SELECT {} FROM send_attempts WHERE contact_id = ?1 ORDER BY attempted_at, id",
            ATTEMPT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let attempts = stmt
            .query_map(params![contact_id], attempt_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attempts)
    }

    // ===== Sender accounts =====

    fn insert_sender(&mut self, sender: &NewSenderAccount) -> StorageResult<i64> {
        let result = self.conn.execute(
            "INSERT INTO senders (name, from_address, smtp_host, smtp_port, username, daily_limit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sender.name,
                sender.from_address,
                sender.smtp_host,
                sender.smtp_port,
                sender.username,
                sender.daily_limit
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(format!(
                    "sender '{}' already exists",
                    sender.name
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list_senders(&self) -> StorageResult<Vec<SenderAccount>> {
        let sql = format!("SELECT {} FROM senders ORDER BY id", SENDER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let senders = stmt
            .query_map([], sender_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(senders)
    }

    fn get_sender(&self, sender_id: i64) -> StorageResult<Option<SenderAccount>> {
        let sql = format!("SELECT {} FROM senders WHERE id = ?1", SENDER_COLUMNS);
        let sender = self
            .conn
            .query_row(&sql, params![sender_id], sender_from_row)
            .optional()?;
        Ok(sender)
    }

    fn increment_sent_today(&mut self, sender_id: i64) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE senders SET sent_today = sent_today + 1
             WHERE id = ?1 AND active = 1 AND sent_today < daily_limit",
            params![sender_id],
        )?;
        Ok(changed == 1)
    }

    fn record_sender_outcome(
        &mut self,
        sender_id: i64,
        success: bool,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let sql = if success {
            "UPDATE senders SET success_count = success_count + 1, last_used_at = ?1 WHERE id = ?2"
        } else {
            "UPDATE senders SET failure_count = failure_count + 1, last_used_at = ?1 WHERE id = ?2"
        };
        self.conn.execute(sql, params![ts(at), sender_id])?;
        Ok(())
    }

    fn deactivate_sender(&mut self, sender_id: i64, reason: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE senders SET active = 0, disabled_reason = ?1 WHERE id = ?2",
            params![reason, sender_id],
        )?;
        Ok(())
    }

    fn reset_daily_counts(&mut self) -> StorageResult<usize> {
        let changed = self
            .conn
            .execute("UPDATE senders SET sent_today = 0 WHERE sent_today != 0", [])?;
        Ok(changed)
    }

    // ===== Qualification rules =====

    fn upsert_rule(
        &mut self,
        name: &str,
        criteria: &serde_json::Map<String, serde_json::Value>,
    ) -> StorageResult<i64> {
        let encoded = serde_json::to_string(criteria)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO rules (name, criteria) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET criteria = excluded.criteria",
            params![name, encoded],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM rules WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn list_rules(&self, active_only: bool) -> StorageResult<Vec<RuleRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, criteria, active FROM rules WHERE (?1 = 0 OR active = 1) ORDER BY id",
        )?;
        let rules = stmt
            .query_map(params![active_only], rule_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    // ===== Templates =====

    fn insert_template(&mut self, template: &NewTemplate) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO templates (name, subject, body, preheader, use_ai, ai_instructions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                template.name,
                template.subject,
                template.body,
                template.preheader,
                template.use_ai,
                template.ai_instructions
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_template(&self, template_id: i64) -> StorageResult<Option<TemplateRecord>> {
        let sql = format!("SELECT {} FROM templates WHERE id = ?1", TEMPLATE_COLUMNS);
        let template = self
            .conn
            .query_row(&sql, params![template_id], template_from_row)
            .optional()?;
        Ok(template)
    }

    fn get_template_by_name(&self, name: &str) -> StorageResult<Option<TemplateRecord>> {
        let sql = format!("SELECT {} FROM templates WHERE name = ?1", TEMPLATE_COLUMNS);
        let template = self
            .conn
            .query_row(&sql, params![name], template_from_row)
            .optional()?;
        Ok(template)
    }

    // ===== Review drafts =====

    fn insert_draft(&mut self, draft: &NewDraft) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO drafts
             (contact_id, site_id, template_id, subject, body, preheader, state, priority,
              ai_assisted, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                draft.contact_id,
                draft.site_id,
                draft.template_id,
                draft.subject,
                draft.body,
                draft.preheader,
                DraftState::Pending.to_db_string(),
                draft.priority.min(100),
                draft.ai_assisted,
                draft.notes,
                ts(Utc::now())
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_draft(&self, draft_id: i64) -> StorageResult<Option<DraftRecord>> {
        let sql = format!("SELECT {} FROM drafts WHERE id = ?1", DRAFT_COLUMNS);
        let draft = self
            .conn
            .query_row(&sql, params![draft_id], draft_from_row)
            .optional()?;
        Ok(draft)
    }

    fn update_draft_content(
        &mut self,
        draft_id: i64,
        subject: &str,
        body: &str,
        preheader: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE drafts SET subject = ?1, body = ?2, preheader = ?3 WHERE id = ?4",
            params![subject, body, preheader, draft_id],
        )?;
        Ok(())
    }

    fn set_draft_state(&mut self, draft_id: i64, state: DraftState) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE drafts SET state = ?1 WHERE id = ?2",
            params![state.to_db_string(), draft_id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("Draft ID {}", draft_id)));
        }
        Ok(())
    }

    fn set_draft_review(
        &mut self,
        draft_id: i64,
        state: DraftState,
        reviewer: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE drafts SET state = ?1, reviewed_by = ?2, reviewed_at = ?3 WHERE id = ?4",
            params![state.to_db_string(), reviewer, ts(at), draft_id],
        )?;
        Ok(())
    }

    fn set_draft_dispatch(
        &mut self,
        draft_id: i64,
        state: DraftState,
        sender_id: Option<i64>,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE drafts SET state = ?1, sender_id = ?2, sent_at = ?3, last_error = ?4
             WHERE id = ?5",
            params![state.to_db_string(), sender_id, ts(at), error, draft_id],
        )?;
        Ok(())
    }

    fn append_draft_note(&mut self, draft_id: i64, note: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE drafts SET notes = CASE
                WHEN notes IS NULL OR notes = '' THEN ?1
                ELSE notes || '; ' || ?1
             END
             WHERE id = ?2",
            params![note, draft_id],
        )?;
        Ok(())
    }

    fn list_drafts(
        &self,
        state: Option<DraftState>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<DraftRecord>> {
        let sql = format!(
            "SELECT {} FROM drafts WHERE (?1 IS NULL OR state = ?1)
             ORDER BY priority DESC, created_at ASC, id ASC LIMIT ?2",
            DRAFT_COLUMNS
        );
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        let drafts = stmt
            .query_map(params![state.map(|s| s.to_db_string()), limit], draft_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(drafts)
    }

    fn delete_terminal_drafts_before(&mut self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM drafts
             WHERE state IN (?1, ?2, ?3)
               AND MAX(COALESCE(sent_at, ''), COALESCE(reviewed_at, ''), created_at) < ?4",
            params![
                DraftState::Rejected.to_db_string(),
                DraftState::Sent.to_db_string(),
                DraftState::Failed.to_db_string(),
                ts(cutoff)
            ],
        )?;
        Ok(deleted)
    }

    // ===== Statistics =====

    fn count_sites_by_status(&self) -> StorageResult<HashMap<SiteStatus, u64>> {
        let rows = self.count_grouped("SELECT status, COUNT(*) FROM sites GROUP BY status")?;
        Ok(rows
            .into_iter()
            .filter_map(|(s, n)| SiteStatus::from_db_string(&s).map(|status| (status, n)))
            .collect())
    }

    fn count_qualified_sites(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sites WHERE qualified = 1", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn count_contacts_by_validation(&self) -> StorageResult<HashMap<ValidationStatus, u64>> {
        let rows =
            self.count_grouped("SELECT validation, COUNT(*) FROM contacts GROUP BY validation")?;
        Ok(rows
            .into_iter()
            .filter_map(|(s, n)| ValidationStatus::from_db_string(&s).map(|status| (status, n)))
            .collect())
    }

    fn count_drafts_by_state(&self) -> StorageResult<HashMap<DraftState, u64>> {
        let rows = self.count_grouped("SELECT state, COUNT(*) FROM drafts GROUP BY state")?;
        Ok(rows
            .into_iter()
            .filter_map(|(s, n)| DraftState::from_db_string(&s).map(|state| (state, n)))
            .collect())
    }

    fn count_send_attempts(&self, outcome: SendOutcome) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM send_attempts WHERE outcome = ?1",
            params![outcome.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_active_suppressions(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM suppressions WHERE active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
