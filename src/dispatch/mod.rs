//! Dispatch of approved drafts
//!
//! Gates run in order: review state, contact validation, sending window,
//! suppression, then sender reservation. A failed gate is a refusal, not an
//! error. Sends to one contact are serialized so the suppression check and
//! the ledger write of one send never interleave with another.

mod mailer;

pub use mailer::{DryRunMailer, Mailer, OutgoingMessage};

use crate::config::{ReviewConfig, SendingConfig};
use crate::review::ReviewQueue;
use crate::schedule::{Clock, SendingWindow};
use crate::sender::SenderRotation;
use crate::state::{DraftState, SendOutcome, ValidationStatus};
use crate::storage::{DraftRecord, NewSendAttempt, Storage};
use crate::suppression::SuppressionEngine;
use crate::url::email_domain;
use crate::{lock_storage, ConfigResult, OutreachError, Result, SharedStorage};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Which gate refused a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalKind {
    NotApproved,
    NotValidated,
    OutsideWindow,
    Suppressed,
    NoCapacity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent {
        draft_id: i64,
        sender_id: i64,
        attempt_id: i64,
    },
    Failed {
        draft_id: i64,
        error: String,
    },
    Refused {
        kind: RefusalKind,
        reason: String,
    },
}

impl DispatchOutcome {
    fn refused(kind: RefusalKind, reason: impl Into<String>) -> Self {
        Self::Refused {
            kind,
            reason: reason.into(),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Totals for one batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchDispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub refused: Vec<(i64, String)>,
    /// True when the batch stopped early because the window closed
    pub window_closed: bool,
}

/// Everything needed to send, gathered under the store lock
struct PreparedSend {
    draft: DraftRecord,
    contact_id: i64,
    site_id: i64,
    sender_id: i64,
    message: OutgoingMessage,
}

pub struct Dispatcher {
    storage: SharedStorage,
    mailer: Arc<dyn Mailer>,
    suppression: Arc<SuppressionEngine>,
    rotation: SenderRotation,
    review: ReviewQueue,
    window: SendingWindow,
    clock: Arc<dyn Clock>,
    send_timeout: Duration,
    contact_locks: parking_lot::Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl Dispatcher {
    pub fn new(
        storage: SharedStorage,
        mailer: Arc<dyn Mailer>,
        suppression: Arc<SuppressionEngine>,
        sending: &SendingConfig,
        review: ReviewConfig,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        Ok(Self {
            storage,
            mailer,
            suppression,
            rotation: SenderRotation::new(sending),
            review: ReviewQueue::new(review),
            window: SendingWindow::new(sending)?,
            clock,
            send_timeout: Duration::from_secs(sending.send_timeout_secs),
            contact_locks: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    pub fn window(&self) -> &SendingWindow {
        &self.window
    }

    fn contact_lock(&self, contact_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.contact_locks
            .lock()
            .entry(contact_id)
            .or_default()
            .clone()
    }

    /// Drops the contact's lock once no other send holds or awaits it
    fn release_contact_lock(&self, contact_id: i64) {
        let mut locks = self.contact_locks.lock();
        if locks
            .get(&contact_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&contact_id);
        }
    }

    /// Runs every gate and reserves a sender
    fn prepare(&self, draft_id: i64, now: DateTime<Utc>) -> Result<std::result::Result<PreparedSend, DispatchOutcome>> {
        let mut store = lock_storage(&self.storage)?;

        let draft = store
            .get_draft(draft_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("draft {}", draft_id)))?;
        if draft.state != DraftState::Approved {
            return Ok(Err(DispatchOutcome::refused(
                RefusalKind::NotApproved,
                "Draft is not approved",
            )));
        }

        let contact = store
            .get_contact(draft.contact_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("contact {}", draft.contact_id)))?;
        if contact.validation != ValidationStatus::Valid {
            return Ok(Err(DispatchOutcome::refused(
                RefusalKind::NotValidated,
                "Contact email is not validated",
            )));
        }

        if !self.window.is_open(now) {
            let next = self.window.next_available_time(now);
            return Ok(Err(DispatchOutcome::refused(
                RefusalKind::OutsideWindow,
                format!("Outside sending window (next: {})", self.window.describe(next)),
            )));
        }

        let site = store
            .get_site(contact.site_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("site {}", contact.site_id)))?;
        let decision = self.suppression.check(&*store, &contact, &site, now)?;
        if decision.is_suppressed() {
            return Ok(Err(DispatchOutcome::refused(
                RefusalKind::Suppressed,
                decision.summary(),
            )));
        }

        let Some(sender) = self.rotation.reserve(&mut *store)? else {
            return Ok(Err(DispatchOutcome::refused(
                RefusalKind::NoCapacity,
                "No sender account with remaining capacity",
            )));
        };

        let message = OutgoingMessage {
            sender_name: sender.name.clone(),
            from: sender.from_address.clone(),
            to: contact.email.clone(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            preheader: draft.preheader.clone(),
        };

        Ok(Ok(PreparedSend {
            contact_id: contact.id,
            site_id: contact.site_id,
            sender_id: sender.id,
            draft,
            message,
        }))
    }

    /// Persists the outcome of a transport attempt
    fn record(&self, prepared: &PreparedSend, error: Option<String>, at: DateTime<Utc>) -> Result<DispatchOutcome> {
        let mut store = lock_storage(&self.storage)?;
        let draft_id = prepared.draft.id;

        let attempt_id = store.append_send_attempt(&NewSendAttempt {
            contact_id: prepared.contact_id,
            site_id: prepared.site_id,
            sender_id: Some(prepared.sender_id),
            draft_id: Some(draft_id),
            recipient_email: prepared.message.to.clone(),
            recipient_domain: email_domain(&prepared.message.to).unwrap_or_default(),
            subject: prepared.message.subject.clone(),
            body: prepared.message.body.clone(),
            outcome: if error.is_none() {
                SendOutcome::Sent
            } else {
                SendOutcome::Failed
            },
            error: error.clone(),
            attempted_at: at,
        })?;
        self.rotation
            .record_outcome(&mut *store, prepared.sender_id, error.is_none(), at)?;

        match error {
            None => {
                store.record_contact_outreach(prepared.contact_id, at)?;
                store.mark_site_contacted(prepared.site_id)?;
                self.review.mark_sent(&mut *store, draft_id, prepared.sender_id, at)?;
                tracing::info!(
                    draft_id,
                    to = %prepared.message.to,
                    sender = %prepared.message.sender_name,
                    "Email sent"
                );
                Ok(DispatchOutcome::Sent {
                    draft_id,
                    sender_id: prepared.sender_id,
                    attempt_id,
                })
            }
            Some(error) => {
                self.review
                    .mark_failed(&mut *store, draft_id, Some(prepared.sender_id), at, &error)?;
                tracing::error!(draft_id, to = %prepared.message.to, error = %error, "Send failed");
                Ok(DispatchOutcome::Failed { draft_id, error })
            }
        }
    }

    /// Sends one approved draft
    ///
    /// # Returns
    ///
    /// * `Ok(DispatchOutcome)` - Sent, failed in transport, or refused by a gate
    /// * `Err(OutreachError)` - The draft is unknown or the store failed
    pub async fn send_draft(&self, draft_id: i64) -> Result<DispatchOutcome> {
        let contact_id = {
            let store = lock_storage(&self.storage)?;
            store
                .get_draft(draft_id)?
                .ok_or_else(|| OutreachError::NotFound(format!("draft {}", draft_id)))?
                .contact_id
        };

        let lock = self.contact_lock(contact_id);
        let outcome = {
            let _serialized = lock.lock().await;
            self.send_serialized(draft_id).await
        };
        drop(lock);
        self.release_contact_lock(contact_id);
        outcome
    }

    /// Gates, sends and records one draft while its contact lock is held
    async fn send_serialized(&self, draft_id: i64) -> Result<DispatchOutcome> {
        let prepared = match self.prepare(draft_id, self.clock.now())? {
            Ok(prepared) => prepared,
            Err(refusal) => {
                if let DispatchOutcome::Refused { reason, .. } = &refusal {
                    tracing::info!(draft_id, reason = %reason, "Send refused");
                }
                return Ok(refusal);
            }
        };

        let error = match tokio::time::timeout(self.send_timeout, self.mailer.send(&prepared.message)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(format!("Send timed out after {}s", self.send_timeout.as_secs())),
        };

        self.record(&prepared, error, self.clock.now())
    }

    /// Sends approved drafts in review order, pacing sends across the
    /// remaining window and stopping once the window closes
    pub async fn send_approved_batch(&self, limit: Option<usize>) -> Result<BatchDispatchReport> {
        let drafts = {
            let store = lock_storage(&self.storage)?;
            store.list_drafts(Some(DraftState::Approved), limit)?
        };

        let mut report = BatchDispatchReport::default();
        let total = drafts.len();

        for (index, draft) in drafts.iter().enumerate() {
            match self.send_draft(draft.id).await? {
                DispatchOutcome::Sent { .. } => report.sent += 1,
                DispatchOutcome::Failed { .. } => report.failed += 1,
                DispatchOutcome::Refused { kind, reason } => {
                    if kind == RefusalKind::OutsideWindow {
                        tracing::info!(reason = %reason, "Batch stopped at window boundary");
                        report.window_closed = true;
                        report.refused.push((draft.id, reason));
                        break;
                    }
                    report.refused.push((draft.id, reason));
                    continue;
                }
            }

            let remaining = total - index - 1;
            if remaining > 0 {
                let delay = self.window.delay_between_sends(remaining, self.clock.now());
                if !delay.is_zero() {
                    tracing::debug!(delay_secs = delay.as_secs(), remaining, "Pacing next send");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::info!(
            sent = report.sent,
            failed = report.failed,
            refused = report.refused.len(),
            "Batch dispatch finished"
        );
        Ok(report)
    }
}
