//! Suppression engine
//!
//! Two gates decide whether a contact may be emailed now:
//! - the blacklist: exact email, the email's domain and the site's domain
//!   (domains match exactly or as a parent)
//! - duplicate prevention: contact cooldown, per-site cap and per-domain cap
//!   over rolling windows of the send ledger
//!
//! Every triggered reason is reported; blacklist reasons come first.

mod cache;
mod delimited;

pub use cache::BlacklistCache;
pub use delimited::{parse_import, render_export, ImportRow, HEADER};

use crate::config::SuppressionConfig;
use crate::state::{SuppressionKind, SuppressionSource};
use crate::storage::{ContactRecord, SiteRecord, Storage, SuppressionEntry};
use crate::url::{domain_suffixes, email_domain};
use crate::{OutreachError, Result};
use chrono::{DateTime, Duration, Utc};

/// Whether a contact may be emailed, and why not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuppressionDecision {
    pub reasons: Vec<String>,
}

impl SuppressionDecision {
    pub fn is_allowed(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn is_suppressed(&self) -> bool {
        !self.reasons.is_empty()
    }

    /// All reasons joined for display
    pub fn summary(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Lowercases and trims a blacklist value; domains also lose a leading `@`
pub fn normalize_value(kind: SuppressionKind, value: &str) -> String {
    let value = value.trim().to_lowercase();
    match kind {
        SuppressionKind::Email => value,
        SuppressionKind::Domain => value
            .trim_start_matches('@')
            .trim_end_matches('.')
            .to_string(),
    }
}

/// Counts for one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub emails: usize,
    pub domains: usize,
}

pub struct SuppressionEngine {
    config: SuppressionConfig,
    cache: BlacklistCache,
}

impl SuppressionEngine {
    pub fn new(config: SuppressionConfig) -> Self {
        Self {
            config,
            cache: BlacklistCache::new(),
        }
    }

    pub fn config(&self) -> &SuppressionConfig {
        &self.config
    }

    // ===== Blacklist maintenance =====

    /// Adds an entry, or reactivates and updates an existing one
    pub fn add<S: Storage>(
        &self,
        store: &mut S,
        kind: SuppressionKind,
        value: &str,
        reason: Option<&str>,
        source: SuppressionSource,
    ) -> Result<i64> {
        let value = normalize_value(kind, value);
        if value.is_empty() {
            return Err(OutreachError::Import("empty suppression value".to_string()));
        }

        let id = store.upsert_suppression(kind, &value, reason, source)?;
        self.cache.invalidate(kind, &value);
        tracing::info!(kind = %kind, value = %value, source = %source, "Suppression entry added");
        Ok(id)
    }

    /// Deletes an entry; returns false if there was none
    pub fn remove<S: Storage>(&self, store: &mut S, kind: SuppressionKind, value: &str) -> Result<bool> {
        let value = normalize_value(kind, value);
        let removed = store.delete_suppression(kind, &value)?;
        self.cache.invalidate(kind, &value);
        Ok(removed)
    }

    /// Activates or deactivates an entry; returns false if there was none
    pub fn set_active<S: Storage>(
        &self,
        store: &mut S,
        kind: SuppressionKind,
        value: &str,
        active: bool,
    ) -> Result<bool> {
        let value = normalize_value(kind, value);
        let updated = store.set_suppression_active(kind, &value, active)?;
        self.cache.invalidate(kind, &value);
        Ok(updated)
    }

    /// Suppresses an address after a hard bounce
    pub fn record_bounce<S: Storage>(&self, store: &mut S, email: &str, detail: &str) -> Result<i64> {
        self.add(
            store,
            SuppressionKind::Email,
            email,
            Some(detail),
            SuppressionSource::AutoBounce,
        )
    }

    /// Suppresses an address after a spam complaint
    pub fn record_complaint<S: Storage>(&self, store: &mut S, email: &str, detail: &str) -> Result<i64> {
        self.add(
            store,
            SuppressionKind::Email,
            email,
            Some(detail),
            SuppressionSource::AutoComplaint,
        )
    }

    /// Imports `value,reason,source` text; nothing is stored if any line is malformed
    pub fn import<S: Storage>(&self, store: &mut S, text: &str) -> Result<ImportReport> {
        let rows = parse_import(text).map_err(OutreachError::Import)?;
        let mut report = ImportReport::default();

        for row in &rows {
            self.add(store, row.kind, &row.value, row.reason.as_deref(), row.source)?;
            match row.kind {
                SuppressionKind::Email => report.emails += 1,
                SuppressionKind::Domain => report.domains += 1,
            }
        }

        tracing::info!(emails = report.emails, domains = report.domains, "Suppression list imported");
        Ok(report)
    }

    pub fn export<S: Storage>(&self, store: &S, active_only: bool) -> Result<String> {
        Ok(render_export(&store.list_suppressions(active_only)?))
    }

    // ===== Gates =====

    /// Cached lookup of one active entry
    pub fn find<S: Storage>(
        &self,
        store: &S,
        kind: SuppressionKind,
        value: &str,
    ) -> Result<Option<SuppressionEntry>> {
        let value = normalize_value(kind, value);
        let entry = self
            .cache
            .get_or_load(kind, &value, || store.find_active_suppression(kind, &value))?;
        Ok(entry)
    }

    fn find_domain<S: Storage>(&self, store: &S, domain: &str) -> Result<Option<SuppressionEntry>> {
        for suffix in domain_suffixes(domain) {
            if let Some(entry) = self.find(store, SuppressionKind::Domain, &suffix)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Blacklist reasons for an address, optionally on a registered site
    ///
    /// Each gate (address, address domain, site domain) reports on its own,
    /// so one domain entry can yield two reasons.
    pub fn blacklist_reasons<S: Storage>(
        &self,
        store: &S,
        email: &str,
        site_domain: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut reasons = Vec::new();

        let describe = |entry: &SuppressionEntry| match &entry.reason {
            Some(reason) => format!(" ({})", reason),
            None => String::new(),
        };

        let email = normalize_value(SuppressionKind::Email, email);
        if let Some(entry) = self.find(store, SuppressionKind::Email, &email)? {
            reasons.push(format!("Email {} is blacklisted{}", email, describe(&entry)));
        }

        if let Some(domain) = email_domain(&email) {
            if let Some(entry) = self.find_domain(store, &domain)? {
                reasons.push(format!(
                    "Email domain {} is blacklisted via {}{}",
                    domain,
                    entry.value,
                    describe(&entry)
                ));
            }
        }

        if let Some(site_domain) = site_domain {
            if let Some(entry) = self.find_domain(store, site_domain)? {
                reasons.push(format!(
                    "Site domain {} is blacklisted via {}{}",
                    site_domain,
                    entry.value,
                    describe(&entry)
                ));
            }
        }

        Ok(reasons)
    }

    /// Rolling-window reasons; a send at exactly the window edge still counts
    pub fn duplicate_reasons<S: Storage>(
        &self,
        store: &S,
        contact: &ContactRecord,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut reasons = Vec::new();

        let cooldown_start = now - Duration::days(self.config.contact_cooldown_days);
        if store.count_sent_to_contact_since(contact.id, cooldown_start)? > 0 {
            reasons.push(format!(
                "Contact was emailed within the last {} days",
                self.config.contact_cooldown_days
            ));
        }

        let window_start = now - Duration::days(self.config.site_window_days);
        let site_sends = store.count_sent_to_site_since(contact.site_id, window_start)?;
        if site_sends >= self.config.site_max_sends {
            reasons.push(format!(
                "Site has {} sends within the last {} days (limit {})",
                site_sends, self.config.site_window_days, self.config.site_max_sends
            ));
        }

        if let Some(domain) = email_domain(&contact.email) {
            let exclude = self
                .config
                .exclude_self_from_domain_count
                .then_some(contact.id);
            let domain_sends = store.count_sent_to_domain_since(&domain, window_start, exclude)?;
            if domain_sends >= self.config.domain_max_sends {
                reasons.push(format!(
                    "Domain {} has {} sends within the last {} days (limit {})",
                    domain, domain_sends, self.config.site_window_days, self.config.domain_max_sends
                ));
            }
        }

        Ok(reasons)
    }

    /// Runs both gates for a contact on its site
    pub fn check<S: Storage>(
        &self,
        store: &S,
        contact: &ContactRecord,
        site: &SiteRecord,
        now: DateTime<Utc>,
    ) -> Result<SuppressionDecision> {
        let mut reasons = self.blacklist_reasons(store, &contact.email, Some(&site.domain))?;
        reasons.extend(self.duplicate_reasons(store, contact, now)?);

        if !reasons.is_empty() {
            tracing::debug!(contact_id = contact.id, reasons = ?reasons, "Contact suppressed");
        }
        Ok(SuppressionDecision { reasons })
    }

    /// Loads a contact and its site, then runs both gates
    pub fn check_contact<S: Storage>(
        &self,
        store: &S,
        contact_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SuppressionDecision> {
        let contact = store
            .get_contact(contact_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("contact {}", contact_id)))?;
        let site = store
            .get_site(contact.site_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("site {}", contact.site_id)))?;
        self.check(store, &contact, &site, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SendOutcome, SourceType};
    use crate::storage::{NewContact, NewSendAttempt, SqliteStorage};

    struct Fixture {
        store: SqliteStorage,
        engine: SuppressionEngine,
        site_id: i64,
    }

    impl Fixture {
        fn new(config: SuppressionConfig) -> Self {
            let mut store = SqliteStorage::open_in_memory().unwrap();
            let site_id = store.insert_site("example.com", "https://example.com/").unwrap();
            Self {
                store,
                engine: SuppressionEngine::new(config),
                site_id,
            }
        }

        fn contact(&mut self, email: &str) -> ContactRecord {
            let id = self
                .store
                .insert_contact(
                    self.site_id,
                    &NewContact {
                        email: email.to_string(),
                        name: None,
                        position: None,
                        source_type: SourceType::Body,
                        source_url: None,
                        snippet: None,
                    },
                )
                .unwrap()
                .unwrap();
            self.store.get_contact(id).unwrap().unwrap()
        }

        fn sent(&mut self, contact: &ContactRecord, at: DateTime<Utc>) {
            self.store
                .append_send_attempt(&NewSendAttempt {
                    contact_id: contact.id,
                    site_id: contact.site_id,
                    sender_id: None,
                    draft_id: None,
                    recipient_email: contact.email.clone(),
                    recipient_domain: email_domain(&contact.email).unwrap(),
                    subject: "Hi".to_string(),
                    body: "Hello".to_string(),
                    outcome: SendOutcome::Sent,
                    error: None,
                    attempted_at: at,
                })
                .unwrap();
        }

        fn site(&self) -> SiteRecord {
            self.store.get_site(self.site_id).unwrap().unwrap()
        }
    }

    #[test]
    fn test_domain_entry_blocks_subdomains_and_addresses() {
        let mut f = Fixture::new(SuppressionConfig::default());
        f.engine
            .add(&mut f.store, SuppressionKind::Domain, "Spam.com", Some("complaint"), SuppressionSource::Manual)
            .unwrap();

        let reasons = f.engine.blacklist_reasons(&f.store, "ceo@spam.com", None).unwrap();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("spam.com"));

        let reasons = f.engine.blacklist_reasons(&f.store, "a@mail.spam.com", None).unwrap();
        assert_eq!(reasons.len(), 1);

        assert!(f.engine.blacklist_reasons(&f.store, "a@notspam.com", None).unwrap().is_empty());
    }

    #[test]
    fn test_email_entry_is_exact_and_case_insensitive() {
        let mut f = Fixture::new(SuppressionConfig::default());
        f.engine
            .add(&mut f.store, SuppressionKind::Email, "CEO@Example.com", None, SuppressionSource::Manual)
            .unwrap();

        assert_eq!(f.engine.blacklist_reasons(&f.store, "ceo@example.com", None).unwrap().len(), 1);
        assert!(f.engine.blacklist_reasons(&f.store, "info@example.com", None).unwrap().is_empty());
    }

    #[test]
    fn test_site_domain_is_checked() {
        let mut f = Fixture::new(SuppressionConfig::default());
        f.engine
            .add(&mut f.store, SuppressionKind::Domain, "example.com", None, SuppressionSource::Manual)
            .unwrap();

        let reasons = f.engine.blacklist_reasons(&f.store, "owner@gmail.com", Some("example.com")).unwrap();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("Site domain"));
    }

    #[test]
    fn test_each_gate_reports_its_own_reason() {
        let mut f = Fixture::new(SuppressionConfig::default());
        f.engine
            .add(&mut f.store, SuppressionKind::Domain, "example.com", Some("asked"), SuppressionSource::Manual)
            .unwrap();
        f.engine
            .add(&mut f.store, SuppressionKind::Email, "ceo@example.com", None, SuppressionSource::Manual)
            .unwrap();

        let reasons = f
            .engine
            .blacklist_reasons(&f.store, "ceo@example.com", Some("example.com"))
            .unwrap();
        assert_eq!(
            reasons,
            vec![
                "Email ceo@example.com is blacklisted".to_string(),
                "Email domain example.com is blacklisted via example.com (asked)".to_string(),
                "Site domain example.com is blacklisted via example.com (asked)".to_string(),
            ]
        );
    }

    #[test]
    fn test_writes_invalidate_cache() {
        let mut f = Fixture::new(SuppressionConfig::default());
        assert!(f.engine.blacklist_reasons(&f.store, "a@b.com", None).unwrap().is_empty());

        f.engine
            .add(&mut f.store, SuppressionKind::Email, "a@b.com", None, SuppressionSource::Manual)
            .unwrap();
        assert_eq!(f.engine.blacklist_reasons(&f.store, "a@b.com", None).unwrap().len(), 1);

        f.engine
            .set_active(&mut f.store, SuppressionKind::Email, "a@b.com", false)
            .unwrap();
        assert!(f.engine.blacklist_reasons(&f.store, "a@b.com", None).unwrap().is_empty());

        f.engine
            .set_active(&mut f.store, SuppressionKind::Email, "a@b.com", true)
            .unwrap();
        assert_eq!(f.engine.blacklist_reasons(&f.store, "a@b.com", None).unwrap().len(), 1);

        assert!(f.engine.remove(&mut f.store, SuppressionKind::Email, "a@b.com").unwrap());
        assert!(f.engine.blacklist_reasons(&f.store, "a@b.com", None).unwrap().is_empty());
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let mut f = Fixture::new(SuppressionConfig::default());
        let contact = f.contact("info@example.com");
        let now = Utc::now();
        f.sent(&contact, now - Duration::days(90));

        let reasons = f.engine.duplicate_reasons(&f.store, &contact, now).unwrap();
        assert!(reasons.iter().any(|r| r.contains("within the last 90 days")));

        let later = now + Duration::seconds(1);
        let reasons = f.engine.duplicate_reasons(&f.store, &contact, later).unwrap();
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_three_reasons_accumulate() {
        let config = SuppressionConfig {
            site_max_sends: 2,
            domain_max_sends: 2,
            ..SuppressionConfig::default()
        };
        let mut f = Fixture::new(config);
        let a = f.contact("a@example.com");
        let b = f.contact("b@example.com");
        let now = Utc::now();
        f.sent(&a, now - Duration::days(1));
        f.sent(&b, now - Duration::days(2));

        let decision = f.engine.check(&f.store, &a, &f.site(), now).unwrap();
        assert_eq!(decision.reasons.len(), 3, "{:?}", decision.reasons);
        assert!(decision.is_suppressed());
    }

    #[test]
    fn test_domain_cap_can_exclude_self() {
        let config = SuppressionConfig {
            contact_cooldown_days: 0,
            site_max_sends: 100,
            domain_max_sends: 2,
            exclude_self_from_domain_count: true,
            ..SuppressionConfig::default()
        };
        let mut f = Fixture::new(config);
        let a = f.contact("a@example.com");
        let b = f.contact("b@example.com");
        let now = Utc::now();
        f.sent(&a, now - Duration::days(3));
        f.sent(&a, now - Duration::days(2));
        f.sent(&b, now - Duration::days(1));

        assert!(f.engine.duplicate_reasons(&f.store, &a, now).unwrap().is_empty());
        assert_eq!(f.engine.duplicate_reasons(&f.store, &b, now).unwrap().len(), 1);
    }

    #[test]
    fn test_blacklist_reasons_come_first() {
        let mut f = Fixture::new(SuppressionConfig::default());
        let contact = f.contact("info@example.com");
        f.sent(&contact, Utc::now());
        f.engine.record_bounce(&mut f.store, "info@example.com", "550 no such user").unwrap();

        let decision = f.engine.check_contact(&f.store, contact.id, Utc::now()).unwrap();
        assert_eq!(decision.reasons.len(), 2);
        assert!(decision.reasons[0].contains("blacklisted"));
        assert!(decision.reasons[0].contains("550 no such user"));
    }

    #[test]
    fn test_import_and_export() {
        let mut f = Fixture::new(SuppressionConfig::default());
        let report = f
            .engine
            .import(&mut f.store, "value,reason,source\nspam.com,,\nceo@x.com,asked,manual\n")
            .unwrap();
        assert_eq!(report, ImportReport { emails: 1, domains: 1 });

        let text = f.engine.export(&f.store, true).unwrap();
        assert!(text.starts_with(HEADER));
        assert!(text.contains("spam.com,,import"));
        assert!(text.contains("ceo@x.com,asked,manual"));
    }

    #[test]
    fn test_bad_import_stores_nothing() {
        let mut f = Fixture::new(SuppressionConfig::default());
        assert!(f.engine.import(&mut f.store, "a.com,,manual\nb.com,,bogus\n").is_err());
        assert!(f.store.list_suppressions(false).unwrap().is_empty());
    }
}
