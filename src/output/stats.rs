//! Statistics generation from the pipeline database
//!
//! This module provides functionality for extracting and displaying
//! pipeline statistics from the storage layer.

use crate::sender::success_rate;
use crate::state::{DraftState, SendOutcome, SiteStatus, ValidationStatus};
use crate::storage::Storage;
use crate::Result;
use std::collections::HashMap;

/// One sender account as shown in statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SenderSummary {
    pub name: String,
    pub active: bool,
    pub sent_today: u32,
    pub daily_limit: u32,
    pub success_rate: Option<f64>,
}

/// Pipeline statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStatistics {
    /// Registered sites
    pub total_sites: u64,

    /// Count of sites by crawl status
    pub sites_by_status: HashMap<SiteStatus, u64>,

    /// Sites that matched at least one rule
    pub qualified_sites: u64,

    /// Count of contacts by validation status
    pub contacts_by_validation: HashMap<ValidationStatus, u64>,

    /// Count of drafts by review state
    pub drafts_by_state: HashMap<DraftState, u64>,

    pub sends_succeeded: u64,
    pub sends_failed: u64,
    pub active_suppressions: u64,
    pub senders: Vec<SenderSummary>,
}

impl PipelineStatistics {
    pub fn total_contacts(&self) -> u64 {
        self.contacts_by_validation.values().sum()
    }

    /// Share of send attempts that succeeded, as a percentage
    pub fn delivery_rate(&self) -> Option<f64> {
        let total = self.sends_succeeded + self.sends_failed;
        (total > 0).then(|| self.sends_succeeded as f64 / total as f64 * 100.0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(PipelineStatistics)` - Successfully loaded statistics
/// * `Err(OutreachError)` - Failed to query statistics
pub fn load_statistics<S: Storage>(storage: &S) -> Result<PipelineStatistics> {
    let sites_by_status = storage.count_sites_by_status()?;

    let senders = storage
        .list_senders()?
        .iter()
        .map(|account| SenderSummary {
            name: account.name.clone(),
            active: account.active,
            sent_today: account.sent_today,
            daily_limit: account.daily_limit,
            success_rate: success_rate(account),
        })
        .collect();

    Ok(PipelineStatistics {
        total_sites: sites_by_status.values().sum(),
        sites_by_status,
        qualified_sites: storage.count_qualified_sites()?,
        contacts_by_validation: storage.count_contacts_by_validation()?,
        drafts_by_state: storage.count_drafts_by_state()?,
        sends_succeeded: storage.count_send_attempts(SendOutcome::Sent)?,
        sends_failed: storage.count_send_attempts(SendOutcome::Failed)?,
        active_suppressions: storage.count_active_suppressions()?,
        senders,
    })
}

fn push_counts<K: std::fmt::Display>(out: &mut String, counts: impl IntoIterator<Item = (K, u64)>) {
    for (key, count) in counts {
        out.push_str(&format!("  {}: {}\n", key, count));
    }
}

/// Formats statistics as plain text
pub fn format_statistics(stats: &PipelineStatistics) -> String {
    let mut out = String::from("=== Pipeline Statistics ===\n\n");

    out.push_str(&format!("Sites ({} total, {} qualified):\n", stats.total_sites, stats.qualified_sites));
    push_counts(
        &mut out,
        SiteStatus::all_states()
            .into_iter()
            .map(|s| (s, stats.sites_by_status.get(&s).copied().unwrap_or(0))),
    );
    out.push('\n');

    out.push_str(&format!("Contacts ({} total):\n", stats.total_contacts()));
    push_counts(
        &mut out,
        [
            ValidationStatus::Unvalidated,
            ValidationStatus::Valid,
            ValidationStatus::Invalid,
        ]
        .into_iter()
        .map(|s| (s, stats.contacts_by_validation.get(&s).copied().unwrap_or(0))),
    );
    out.push('\n');

    out.push_str("Drafts:\n");
    push_counts(
        &mut out,
        DraftState::all_states()
            .into_iter()
            .map(|s| (s, stats.drafts_by_state.get(&s).copied().unwrap_or(0))),
    );
    out.push('\n');

    out.push_str("Sending:\n");
    out.push_str(&format!("  Sent: {}\n", stats.sends_succeeded));
    out.push_str(&format!("  Failed: {}\n", stats.sends_failed));
    if let Some(rate) = stats.delivery_rate() {
        out.push_str(&format!("  Delivery rate: {:.1}%\n", rate));
    }
    out.push_str(&format!("  Active suppressions: {}\n", stats.active_suppressions));

    if !stats.senders.is_empty() {
        out.push_str("\nSender accounts:\n");
        for sender in &stats.senders {
            let health = sender
                .success_rate
                .map(|r| format!("{:.1}%", r * 100.0))
                .unwrap_or_else(|| "n/a".to_string());
            out.push_str(&format!(
                "  {} [{}] {}/{} today, success {}\n",
                sender.name,
                if sender.active { "active" } else { "disabled" },
                sender.sent_today,
                sender.daily_limit,
                health
            ));
        }
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &PipelineStatistics) {
    print!("{}", format_statistics(stats));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SourceType;
    use crate::storage::{NewContact, NewSenderAccount, SqliteStorage};
    use chrono::Utc;

    #[test]
    fn test_load_and_format() {
        let mut store = SqliteStorage::open_in_memory().unwrap();
        let site_id = store.insert_site("example.com", "https://example.com/").unwrap();
        store.insert_site("other.org", "https://other.org/").unwrap();
        store.set_site_qualified(site_id, true).unwrap();
        store
            .insert_contact(
                site_id,
                &NewContact {
                    email: "info@example.com".to_string(),
                    name: None,
                    position: None,
                    source_type: SourceType::Body,
                    source_url: None,
                    snippet: None,
                },
            )
            .unwrap();
        let sender_id = store
            .insert_sender(&NewSenderAccount {
                name: "primary".to_string(),
                from_address: "me@agency.test".to_string(),
                daily_limit: 20,
                smtp_host: None,
                smtp_port: None,
                username: None,
            })
            .unwrap();
        store.record_sender_outcome(sender_id, true, Utc::now()).unwrap();

        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.total_sites, 2);
        assert_eq!(stats.qualified_sites, 1);
        assert_eq!(stats.total_contacts(), 1);
        assert_eq!(stats.delivery_rate(), None);

        let text = format_statistics(&stats);
        assert!(text.contains("Sites (2 total, 1 qualified)"));
        assert!(text.contains("primary [active] 0/20 today, success 100.0%"));
    }
}
