//! Qualification evaluator
//!
//! A site qualifies if at least one named rule fully matches its derived
//! signals. Rules are stored in the record store and may be seeded from the
//! `[[rules]]` tables of the configuration.

mod criteria;

pub use criteria::{Criterion, CriterionError, CriterionResult};

use crate::config::RuleEntry;
use crate::state::SiteStatus;
use crate::storage::{RuleRecord, SiteRecord, Storage};
use crate::{lock_storage, OutreachError, Result, SharedStorage};
use serde_json::{Map, Value};

/// A named, ordered set of criteria
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub criteria: Vec<Criterion>,
}

impl Rule {
    /// Parses every criterion of a rule; the first bad one is an error
    pub fn from_map(name: &str, criteria: &Map<String, Value>) -> std::result::Result<Self, CriterionError> {
        let criteria = criteria
            .iter()
            .map(|(key, value)| Criterion::from_raw(key, value))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            criteria,
        })
    }

    pub fn from_record(record: &RuleRecord) -> std::result::Result<Self, CriterionError> {
        Self::from_map(&record.name, &record.criteria)
    }

    /// Evaluates every criterion; a rule with no criteria never passes
    pub fn evaluate(&self, site: &SiteRecord) -> RuleOutcome {
        let results: Vec<CriterionResult> =
            self.criteria.iter().map(|c| c.evaluate(site)).collect();
        let passed = !results.is_empty() && results.iter().all(|r| r.matched);

        RuleOutcome {
            rule: self.name.clone(),
            passed,
            results,
        }
    }
}

/// Outcome of one rule against one site
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub rule: String,
    pub passed: bool,
    pub results: Vec<CriterionResult>,
}

/// Outcome of all rules against one site
#[derive(Debug, Clone, PartialEq)]
pub struct QualificationReport {
    pub site_id: i64,
    pub qualified: bool,
    pub rules: Vec<RuleOutcome>,
}

impl QualificationReport {
    /// Names of the rules that passed
    pub fn matched_rules(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.passed)
            .map(|r| r.rule.as_str())
            .collect()
    }
}

/// Evaluates a site against every rule without touching storage
pub fn evaluate_site(site: &SiteRecord, rules: &[Rule]) -> QualificationReport {
    let outcomes: Vec<RuleOutcome> = rules.iter().map(|r| r.evaluate(site)).collect();

    QualificationReport {
        site_id: site.id,
        qualified: outcomes.iter().any(|o| o.passed),
        rules: outcomes,
    }
}

/// Parses the active rules held in the record store
pub fn load_rules<S: Storage>(store: &S) -> Result<Vec<Rule>> {
    store
        .list_rules(true)?
        .iter()
        .map(|record| Rule::from_record(record).map_err(OutreachError::from))
        .collect()
}

/// Stores the configured rules, rejecting the whole set if any rule is malformed
///
/// # Returns
///
/// Number of rules stored
pub fn seed_rules<S: Storage>(store: &mut S, entries: &[RuleEntry]) -> Result<usize> {
    for entry in entries {
        Rule::from_map(&entry.name, &entry.criteria)?;
    }

    for entry in entries {
        store.upsert_rule(&entry.name, &entry.criteria)?;
        tracing::debug!(rule = %entry.name, "Stored qualification rule");
    }
    Ok(entries.len())
}

/// Evaluates one site and persists its qualification flag
pub fn qualify_site(storage: &SharedStorage, site_id: i64) -> Result<QualificationReport> {
    let mut store = lock_storage(storage)?;
    let rules = load_rules(&*store)?;

    let site = store
        .get_site(site_id)?
        .ok_or_else(|| OutreachError::NotFound(format!("site {}", site_id)))?;

    let report = evaluate_site(&site, &rules);
    store.set_site_qualified(site_id, report.qualified)?;

    if !site.status.has_signals() {
        tracing::warn!(site_id, status = %site.status, "Qualifying a site without crawl signals");
    }
    tracing::info!(
        site_id,
        domain = %site.domain,
        qualified = report.qualified,
        matched = ?report.matched_rules(),
        "Site qualification evaluated"
    );

    Ok(report)
}

/// Evaluates every completed site
pub fn qualify_completed_sites(storage: &SharedStorage) -> Result<Vec<QualificationReport>> {
    let mut store = lock_storage(storage)?;
    let rules = load_rules(&*store)?;
    let sites = store.list_sites(Some(SiteStatus::Completed))?;

    let mut reports = Vec::with_capacity(sites.len());
    for site in &sites {
        let report = evaluate_site(site, &rules);
        store.set_site_qualified(site.id, report.qualified)?;
        reports.push(report);
    }

    tracing::info!(
        sites = reports.len(),
        qualified = reports.iter().filter(|r| r.qualified).count(),
        "Qualification pass finished"
    );
    Ok(reports)
}
