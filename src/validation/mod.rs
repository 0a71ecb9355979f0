//! Email validation engine
//!
//! Checks run in order and stop at the first failure:
//! 1. syntax
//! 2. disposable-domain blocklist
//! 3. domain resolvability (MX records, else an address record)
//!
//! A DNS-layer error is reported as a validation failure, never propagated.

mod resolver;
mod syntax;

pub use resolver::{DnsResolver, LookupFailure, MailDomainResolver, MailExchange};
pub use syntax::is_valid_email;

use crate::config::ValidationConfig;
use crate::state::ValidationStatus;
use crate::storage::{ContactRecord, Storage};
use crate::url::{domain_suffixes, email_domain};
use crate::{lock_storage, Result, SharedStorage};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const REASON_INVALID_FORMAT: &str = "Invalid email format";
pub const REASON_DISPOSABLE: &str = "Disposable email domain";
pub const REASON_UNROUTABLE: &str = "No mail-exchange or address record";

/// Outcome of validating one address
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub reason: Option<String>,
    /// Lowest-preference exchanger, when the domain has MX records
    pub mx_host: Option<String>,
}

impl ValidationVerdict {
    fn valid(mx_host: Option<String>) -> Self {
        Self {
            valid: true,
            reason: None,
            mx_host,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            mx_host: None,
        }
    }

    pub fn status(&self) -> ValidationStatus {
        if self.valid {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        }
    }
}

/// Counts for one validation batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchValidationReport {
    pub validated: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Per-batch memo of domain resolvability
type DomainMemo = HashMap<String, ValidationVerdict>;

pub struct ValidationEngine {
    resolver: Arc<dyn MailDomainResolver>,
    disposable: HashSet<String>,
}

impl ValidationEngine {
    pub fn new(resolver: Arc<dyn MailDomainResolver>, config: &ValidationConfig) -> Self {
        let disposable = config
            .disposable_domains
            .iter()
            .chain(config.extra_disposable_domains.iter())
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Self {
            resolver,
            disposable,
        }
    }

    /// A domain is disposable if it or any parent domain is on the blocklist
    pub fn is_disposable(&self, domain: &str) -> bool {
        domain_suffixes(domain)
            .iter()
            .any(|suffix| self.disposable.contains(suffix))
    }

    async fn resolve_domain(&self, domain: &str) -> ValidationVerdict {
        match self.resolver.mail_exchangers(domain).await {
            Ok(mut records) if !records.is_empty() => {
                records.sort_by_key(|mx| mx.preference);
                let host = records.into_iter().next().map(|mx| mx.host);
                tracing::debug!(domain, mx = host.as_deref().unwrap_or(""), "Domain has MX records");
                return ValidationVerdict::valid(host);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(domain, error = %e, "MX lookup failed");
                return ValidationVerdict::invalid(format!("DNS lookup failed: {}", e));
            }
        }

        match self.resolver.has_address_record(domain).await {
            Ok(true) => ValidationVerdict::valid(None),
            Ok(false) => ValidationVerdict::invalid(REASON_UNROUTABLE),
            Err(e) => {
                tracing::warn!(domain, error = %e, "Address lookup failed");
                ValidationVerdict::invalid(format!("DNS lookup failed: {}", e))
            }
        }
    }

    async fn validate_with_memo(&self, email: &str, memo: &mut DomainMemo) -> ValidationVerdict {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return ValidationVerdict::invalid(REASON_INVALID_FORMAT);
        }

        let Some(domain) = email_domain(&email) else {
            return ValidationVerdict::invalid(REASON_INVALID_FORMAT);
        };

        if self.is_disposable(&domain) {
            return ValidationVerdict::invalid(REASON_DISPOSABLE);
        }

        if let Some(verdict) = memo.get(&domain) {
            return verdict.clone();
        }

        let verdict = self.resolve_domain(&domain).await;
        memo.insert(domain, verdict.clone());
        verdict
    }

    /// Validates a single address
    ///
    /// # Example
    ///
    /// ```no_run
    /// use outreach_pipeline::config::ValidationConfig;
    /// use outreach_pipeline::validation::{DnsResolver, ValidationEngine};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # async fn run() {
    /// let resolver = Arc::new(DnsResolver::new(Duration::from_secs(5)));
    /// let engine = ValidationEngine::new(resolver, &ValidationConfig::default());
    /// let verdict = engine.validate_email("info@example.com").await;
    /// println!("{:?}", verdict.reason);
    /// # }
    /// ```
    pub async fn validate_email(&self, email: &str) -> ValidationVerdict {
        self.validate_with_memo(email, &mut DomainMemo::new()).await
    }

    /// Validates contacts and persists each verdict
    ///
    /// Domain lookups are shared across the batch, so a domain is resolved
    /// at most once.
    pub async fn validate_contacts(
        &self,
        storage: &SharedStorage,
        contacts: &[ContactRecord],
    ) -> Result<BatchValidationReport> {
        let mut memo = DomainMemo::new();
        let mut report = BatchValidationReport::default();

        for contact in contacts {
            let verdict = self.validate_with_memo(&contact.email, &mut memo).await;

            lock_storage(storage)?.update_contact_validation(
                contact.id,
                verdict.status(),
                verdict.reason.as_deref(),
                verdict.mx_host.as_deref(),
                Utc::now(),
            )?;

            report.validated += 1;
            if verdict.valid {
                report.valid += 1;
            } else {
                report.invalid += 1;
                tracing::debug!(
                    contact_id = contact.id,
                    email = %contact.email,
                    reason = verdict.reason.as_deref().unwrap_or(""),
                    "Contact failed validation"
                );
            }
        }

        tracing::info!(
            validated = report.validated,
            valid = report.valid,
            invalid = report.invalid,
            "Validation batch finished"
        );
        Ok(report)
    }

    /// Validates every contact that has not been validated yet
    pub async fn validate_pending(&self, storage: &SharedStorage) -> Result<BatchValidationReport> {
        let contacts = lock_storage(storage)?.list_contacts_by_validation(ValidationStatus::Unvalidated)?;
        self.validate_contacts(storage, &contacts).await
    }
}
