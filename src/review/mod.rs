//! Human review queue for outgoing drafts
//!
//! State machine:
//!
//! ```text
//! pending ──> approved ──> sent
//!    │           └──────> failed ──┐
//!    └──────> rejected ────────────┴──> pending (requeue)
//! ```
//!
//! Only approved drafts may be dispatched. Cleanup never touches pending or
//! approved drafts.

use crate::config::ReviewConfig;
use crate::state::DraftState;
use crate::storage::{ContactRecord, DraftRecord, NewDraft, SiteRecord, Storage};
use crate::{OutreachError, Result};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReviewError {
    #[error("Draft {draft_id} cannot move from {from} to {to}")]
    InvalidTransition {
        draft_id: i64,
        from: DraftState,
        to: DraftState,
    },
}

/// Rendered content handed to the queue
#[derive(Debug, Clone, PartialEq)]
pub struct DraftContent {
    pub template_id: Option<i64>,
    pub subject: String,
    pub body: String,
    pub preheader: Option<String>,
    pub ai_assisted: bool,
}

/// Reviewer edits applied before approval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftEdits {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub preheader: Option<String>,
}

impl DraftEdits {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.body.is_none() && self.preheader.is_none()
    }
}

/// Priority and the triggers that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub priority: u8,
    pub reasons: Vec<String>,
}

/// Result of one draft in a bulk operation
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome {
    pub draft_id: i64,
    pub error: Option<String>,
}

impl BulkOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ReviewQueue {
    config: ReviewConfig,
}

impl ReviewQueue {
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    /// Computes the review priority: the highest of the base and every
    /// triggered floor
    ///
    /// # Arguments
    ///
    /// * `force_priority` - Caller-requested priority, treated as one more trigger
    pub fn escalate(
        &self,
        contact: &ContactRecord,
        site: &SiteRecord,
        ai_assisted: bool,
        force_priority: Option<u8>,
    ) -> Escalation {
        let mut priority = self.config.base_priority;
        let mut reasons = Vec::new();

        if contact.priority >= self.config.contact_priority_threshold {
            priority = priority.max(self.config.contact_priority_floor);
            reasons.push(format!("High-priority contact ({})", contact.priority));
        }
        if !site.contacted {
            priority = priority.max(self.config.uncontacted_site_floor);
            reasons.push("Site not contacted before".to_string());
        }
        if ai_assisted {
            priority = priority.max(self.config.ai_assisted_floor);
            reasons.push("AI-assisted content".to_string());
        }
        if let Some(forced) = force_priority {
            let forced = forced.min(100);
            priority = priority.max(forced);
            reasons.push(format!("Forced review ({})", forced));
        }

        Escalation { priority, reasons }
    }

    /// Queues a draft for a contact as `pending`
    pub fn submit<S: Storage>(
        &self,
        store: &mut S,
        contact_id: i64,
        content: DraftContent,
        force_priority: Option<u8>,
    ) -> Result<DraftRecord> {
        let contact = store
            .get_contact(contact_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("contact {}", contact_id)))?;
        let site = store
            .get_site(contact.site_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("site {}", contact.site_id)))?;

        let escalation = self.escalate(&contact, &site, content.ai_assisted, force_priority);
        let notes = (!escalation.reasons.is_empty()).then(|| escalation.reasons.join("; "));

        let draft_id = store.insert_draft(&NewDraft {
            contact_id,
            site_id: contact.site_id,
            template_id: content.template_id,
            subject: content.subject,
            body: content.body,
            preheader: content.preheader,
            priority: escalation.priority,
            ai_assisted: content.ai_assisted,
            notes,
        })?;

        tracing::info!(
            draft_id,
            contact_id,
            priority = escalation.priority,
            "Draft queued for review"
        );
        self.load(store, draft_id)
    }

    pub fn list<S: Storage>(
        &self,
        store: &S,
        state: Option<DraftState>,
        limit: Option<usize>,
    ) -> Result<Vec<DraftRecord>> {
        Ok(store.list_drafts(state, limit)?)
    }

    pub fn load<S: Storage>(&self, store: &S, draft_id: i64) -> Result<DraftRecord> {
        store
            .get_draft(draft_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("draft {}", draft_id)))
    }

    /// Loads a draft and checks that it may move to `next`
    fn guard<S: Storage>(&self, store: &S, draft_id: i64, next: DraftState) -> Result<DraftRecord> {
        let draft = self.load(store, draft_id)?;
        if !draft.state.can_transition_to(next) {
            return Err(ReviewError::InvalidTransition {
                draft_id,
                from: draft.state,
                to: next,
            }
            .into());
        }
        Ok(draft)
    }

    /// Approves a pending draft, applying any edits first
    pub fn approve<S: Storage>(
        &self,
        store: &mut S,
        draft_id: i64,
        reviewer: Option<&str>,
        edits: &DraftEdits,
        now: DateTime<Utc>,
    ) -> Result<DraftRecord> {
        let draft = self.guard(store, draft_id, DraftState::Approved)?;

        if !edits.is_empty() {
            let subject = edits.subject.as_deref().unwrap_or(&draft.subject);
            let body = edits.body.as_deref().unwrap_or(&draft.body);
            let preheader = edits.preheader.as_deref().or(draft.preheader.as_deref());
            store.update_draft_content(draft_id, subject, body, preheader)?;
        }

        store.set_draft_review(draft_id, DraftState::Approved, reviewer, now)?;
        tracing::info!(draft_id, edited = !edits.is_empty(), "Draft approved");
        self.load(store, draft_id)
    }

    pub fn reject<S: Storage>(
        &self,
        store: &mut S,
        draft_id: i64,
        reviewer: Option<&str>,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DraftRecord> {
        self.guard(store, draft_id, DraftState::Rejected)?;

        store.set_draft_review(draft_id, DraftState::Rejected, reviewer, now)?;
        if let Some(reason) = reason {
            store.append_draft_note(draft_id, &format!("Rejected: {}", reason))?;
        }
        tracing::info!(draft_id, "Draft rejected");
        self.load(store, draft_id)
    }

    /// Moves a rejected or failed draft back to pending
    pub fn requeue<S: Storage>(&self, store: &mut S, draft_id: i64) -> Result<DraftRecord> {
        let draft = self.guard(store, draft_id, DraftState::Pending)?;

        store.set_draft_state(draft_id, DraftState::Pending)?;
        store.append_draft_note(draft_id, &format!("Requeued from {}", draft.state))?;
        tracing::info!(draft_id, from = %draft.state, "Draft requeued");
        self.load(store, draft_id)
    }

    /// Records a successful dispatch of an approved draft
    pub fn mark_sent<S: Storage>(
        &self,
        store: &mut S,
        draft_id: i64,
        sender_id: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.guard(store, draft_id, DraftState::Sent)?;
        store.set_draft_dispatch(draft_id, DraftState::Sent, Some(sender_id), at, None)?;
        Ok(())
    }

    /// Records a failed dispatch of an approved draft
    pub fn mark_failed<S: Storage>(
        &self,
        store: &mut S,
        draft_id: i64,
        sender_id: Option<i64>,
        at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        self.guard(store, draft_id, DraftState::Failed)?;
        store.set_draft_dispatch(draft_id, DraftState::Failed, sender_id, at, Some(error))?;
        Ok(())
    }

    pub fn bulk_approve<S: Storage>(
        &self,
        store: &mut S,
        draft_ids: &[i64],
        reviewer: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<BulkOutcome> {
        let edits = DraftEdits::default();
        draft_ids
            .iter()
            .map(|&draft_id| BulkOutcome {
                draft_id,
                error: self
                    .approve(store, draft_id, reviewer, &edits, now)
                    .err()
                    .map(|e| e.to_string()),
            })
            .collect()
    }

    pub fn bulk_reject<S: Storage>(
        &self,
        store: &mut S,
        draft_ids: &[i64],
        reviewer: Option<&str>,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<BulkOutcome> {
        draft_ids
            .iter()
            .map(|&draft_id| BulkOutcome {
                draft_id,
                error: self
                    .reject(store, draft_id, reviewer, reason, now)
                    .err()
                    .map(|e| e.to_string()),
            })
            .collect()
    }

    /// Deletes terminal drafts older than the retention period
    pub fn cleanup<S: Storage>(&self, store: &mut S, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::days(self.config.retention_days);
        let deleted = store.delete_terminal_drafts_before(cutoff)?;
        if deleted > 0 {
            tracing::info!(deleted, retention_days = self.config.retention_days, "Old drafts purged");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SourceType;
    use crate::storage::{NewContact, SqliteStorage};

    struct Fixture {
        store: SqliteStorage,
        queue: ReviewQueue,
        contact_id: i64,
    }

    fn content(ai_assisted: bool) -> DraftContent {
        DraftContent {
            template_id: None,
            subject: "Quick question".to_string(),
            body: "Hello there".to_string(),
            preheader: None,
            ai_assisted,
        }
    }

    fn fixture() -> Fixture {
        let mut store = SqliteStorage::open_in_memory().unwrap();
        let site_id = store.insert_site("example.com", "https://example.com/").unwrap();
        let contact_id = store
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
            .unwrap()
            .unwrap();
        Fixture {
            store,
            queue: ReviewQueue::new(ReviewConfig::default()),
            contact_id,
        }
    }

    #[test]
    fn test_escalation_takes_max_and_joins_notes() {
        let mut f = fixture();
        f.store.set_contact_priority(f.contact_id, 80).unwrap();

        let draft = f.queue.submit(&mut f.store, f.contact_id, content(true), None).unwrap();
        assert_eq!(draft.state, DraftState::Pending);
        assert_eq!(draft.priority, 75);
        let notes = draft.notes.unwrap();
        assert!(notes.contains("High-priority contact"));
        assert!(notes.contains("Site not contacted"));
        assert!(notes.contains("AI-assisted"));
    }

    #[test]
    fn test_base_priority_without_triggers() {
        let mut f = fixture();
        let site_id = f.store.get_contact(f.contact_id).unwrap().unwrap().site_id;
        f.store.mark_site_contacted(site_id).unwrap();

        let draft = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        assert_eq!(draft.priority, 50);
        assert_eq!(draft.notes, None);

        let forced = f.queue.submit(&mut f.store, f.contact_id, content(false), Some(95)).unwrap();
        assert_eq!(forced.priority, 95);
    }

    #[test]
    fn test_approve_applies_edits() {
        let mut f = fixture();
        let draft = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        let edits = DraftEdits {
            subject: Some("Better subject".to_string()),
            ..DraftEdits::default()
        };

        let approved = f
            .queue
            .approve(&mut f.store, draft.id, Some("dana"), &edits, Utc::now())
            .unwrap();
        assert_eq!(approved.state, DraftState::Approved);
        assert_eq!(approved.subject, "Better subject");
        assert_eq!(approved.body, "Hello there");
        assert_eq!(approved.reviewed_by.as_deref(), Some("dana"));
    }

    #[test]
    fn test_invalid_transitions_name_both_states() {
        let mut f = fixture();
        let now = Utc::now();
        let draft = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        f.queue.reject(&mut f.store, draft.id, None, Some("tone"), now).unwrap();

        let err = f
            .queue
            .approve(&mut f.store, draft.id, None, &DraftEdits::default(), now)
            .unwrap_err();
        match err {
            OutreachError::Review(ReviewError::InvalidTransition { from, to, .. }) => {
                assert_eq!(from, DraftState::Rejected);
                assert_eq!(to, DraftState::Approved);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(f.queue.mark_sent(&mut f.store, draft.id, 1, now).is_err());

        let requeued = f.queue.requeue(&mut f.store, draft.id).unwrap();
        assert_eq!(requeued.state, DraftState::Pending);
        assert!(requeued.notes.unwrap().contains("Rejected: tone"));
        assert!(f.queue.requeue(&mut f.store, draft.id).is_err());
    }

    #[test]
    fn test_bulk_reports_each_draft() {
        let mut f = fixture();
        let now = Utc::now();
        let a = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        let b = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        f.queue.reject(&mut f.store, b.id, None, None, now).unwrap();

        let outcomes = f.queue.bulk_approve(&mut f.store, &[a.id, b.id, 999], None, now);
        assert!(outcomes[0].succeeded());
        assert!(!outcomes[1].succeeded());
        assert!(outcomes[2].error.as_deref().unwrap().contains("draft 999"));
    }

    #[test]
    fn test_cleanup_keeps_open_drafts() {
        let mut f = fixture();
        let now = Utc::now();
        let pending = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        let rejected = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        f.queue.reject(&mut f.store, rejected.id, None, None, now).unwrap();

        let later = now + Duration::days(91);
        assert_eq!(f.queue.cleanup(&mut f.store, later).unwrap(), 1);
        assert!(f.store.get_draft(pending.id).unwrap().is_some());
        assert!(f.store.get_draft(rejected.id).unwrap().is_none());
    }

    #[test]
    fn test_cleanup_ages_drafts_by_latest_activity() {
        let mut f = fixture();
        let now = Utc::now();
        let long_ago = now - Duration::days(200);

        let draft = f.queue.submit(&mut f.store, f.contact_id, content(false), None).unwrap();
        f.queue
            .approve(&mut f.store, draft.id, None, &DraftEdits::default(), long_ago)
            .unwrap();
        f.queue
            .mark_failed(&mut f.store, draft.id, None, long_ago, "connection reset")
            .unwrap();
        f.queue.requeue(&mut f.store, draft.id).unwrap();
        f.queue.reject(&mut f.store, draft.id, None, None, now).unwrap();

        assert_eq!(f.queue.cleanup(&mut f.store, now).unwrap(), 0);
        assert!(f.store.get_draft(draft.id).unwrap().is_some());

        let later = now + Duration::days(91);
        assert_eq!(f.queue.cleanup(&mut f.store, later).unwrap(), 1);
    }
}
