//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the pipeline database.
//! Timestamps are fixed-width RFC 3339 strings in UTC so range comparisons
//! can be done on the text column directly.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Registered websites and their crawl signals
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    page_count INTEGER,
    word_count INTEGER,
    detected_platform TEXT,
    content_snapshot TEXT,
    title TEXT,
    qualified INTEGER NOT NULL DEFAULT 0,
    contacted INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    last_crawled_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sites_status ON sites(status);

-- Contacts discovered on a site; one row per (site, address)
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    email TEXT NOT NULL,
    name TEXT,
    position TEXT,
    source_type TEXT NOT NULL,
    source_url TEXT,
    snippet TEXT,
    validation TEXT NOT NULL,
    validation_reason TEXT,
    validated_at TEXT,
    mx_host TEXT,
    priority INTEGER NOT NULL DEFAULT 50,
    contacted INTEGER NOT NULL DEFAULT 0,
    contact_count INTEGER NOT NULL DEFAULT 0,
    last_contacted_at TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(site_id, email)
);

CREATE INDEX IF NOT EXISTS idx_contacts_site ON contacts(site_id);
CREATE INDEX IF NOT EXISTS idx_contacts_validation ON contacts(validation);

-- Blacklist
CREATE TABLE IF NOT EXISTS suppressions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    value TEXT NOT NULL,
    reason TEXT,
    source TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    UNIQUE(kind, value)
);

-- Mailboxes the pipeline sends from
CREATE TABLE IF NOT EXISTS senders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    from_address TEXT NOT NULL,
    smtp_host TEXT,
    smtp_port INTEGER,
    username TEXT,
    daily_limit INTEGER NOT NULL,
    sent_today INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    last_used_at TEXT,
    disabled_reason TEXT
);

-- Append-only send ledger
CREATE TABLE IF NOT EXISTS send_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id INTEGER NOT NULL REFERENCES contacts(id),
    site_id INTEGER NOT NULL REFERENCES sites(id),
    sender_id INTEGER REFERENCES senders(id),
    draft_id INTEGER,
    recipient_email TEXT NOT NULL,
    recipient_domain TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    outcome TEXT NOT NULL,
    error TEXT,
    attempted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_send_attempts_contact ON send_attempts(contact_id, attempted_at);
CREATE INDEX IF NOT EXISTS idx_send_attempts_site ON send_attempts(site_id, attempted_at);
CREATE INDEX IF NOT EXISTS idx_send_attempts_domain ON send_attempts(recipient_domain, attempted_at);

-- Named qualification rule-sets
CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    criteria TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

-- Email templates
CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    preheader TEXT,
    use_ai INTEGER NOT NULL DEFAULT 0,
    ai_instructions TEXT
);

-- Review queue
CREATE TABLE IF NOT EXISTS drafts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id INTEGER NOT NULL REFERENCES contacts(id),
    site_id INTEGER NOT NULL REFERENCES sites(id),
    template_id INTEGER REFERENCES templates(id),
    sender_id INTEGER REFERENCES senders(id),
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    preheader TEXT,
    state TEXT NOT NULL,
    priority INTEGER NOT NULL,
    ai_assisted INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    reviewed_by TEXT,
    reviewed_at TEXT,
    sent_at TEXT,
    last_error TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_drafts_queue ON drafts(state, priority DESC, created_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
