//! Sender account rotation and health
//!
//! Selection picks the active account with the lowest `sent_today` that is
//! still below its daily limit, ties broken by account ID. Reservation does
//! the pick and the increment against one exclusively borrowed store, so
//! callers holding the store lock can never overshoot a daily limit.

use crate::config::{SenderEntry, SendingConfig};
use crate::storage::{NewSenderAccount, SenderAccount, Storage};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Health of one account
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SenderHealth {
    /// None when the account has no recorded outcomes
    pub success_rate: Option<f64>,
    pub samples: u64,
    pub healthy: bool,
}

/// An account disabled by a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct DisabledSender {
    pub sender_id: i64,
    pub name: String,
    pub reason: String,
}

/// Success ratio, or None with no history
pub fn success_rate(account: &SenderAccount) -> Option<f64> {
    let total = account.success_count + account.failure_count;
    if total == 0 {
        None
    } else {
        Some(account.success_count as f64 / total as f64)
    }
}

/// True when the account may be picked for a send right now
pub fn has_capacity(account: &SenderAccount) -> bool {
    account.active && account.sent_today < account.daily_limit
}

/// Picks the eligible account with the lowest `sent_today`
///
/// `accounts` must be ordered by ID for ties to resolve to the lowest ID.
pub fn pick_account(accounts: &[SenderAccount]) -> Option<&SenderAccount> {
    accounts
        .iter()
        .filter(|a| has_capacity(a))
        .min_by_key(|a| (a.sent_today, a.id))
}

pub struct SenderRotation {
    health_threshold: f64,
    min_health_samples: u64,
}

impl SenderRotation {
    pub fn new(config: &SendingConfig) -> Self {
        Self {
            health_threshold: config.health_threshold,
            min_health_samples: config.min_health_samples,
        }
    }

    /// Health of an account; zero history is healthy and only a rate
    /// strictly below the threshold is unhealthy
    pub fn health(&self, account: &SenderAccount) -> SenderHealth {
        let rate = success_rate(account);
        SenderHealth {
            success_rate: rate,
            samples: account.success_count + account.failure_count,
            healthy: rate.map(|r| r >= self.health_threshold).unwrap_or(true),
        }
    }

    pub fn is_healthy(&self, account: &SenderAccount) -> bool {
        self.health(account).healthy
    }

    /// Registers configured accounts that are not stored yet (matched by name)
    pub fn seed<S: Storage>(&self, store: &mut S, entries: &[SenderEntry]) -> Result<usize> {
        let existing: HashSet<String> = store.list_senders()?.into_iter().map(|s| s.name).collect();

        let mut added = 0;
        for entry in entries.iter().filter(|e| !existing.contains(&e.name)) {
            store.insert_sender(&NewSenderAccount::from(entry))?;
            tracing::info!(sender = %entry.name, daily_limit = entry.daily_limit, "Sender account registered");
            added += 1;
        }
        Ok(added)
    }

    /// The account the next send would use, without reserving it
    pub fn select<S: Storage>(&self, store: &S) -> Result<Option<SenderAccount>> {
        let accounts = store.list_senders()?;
        Ok(pick_account(&accounts).cloned())
    }

    /// Selects an account and counts one send against its daily limit
    ///
    /// # Returns
    ///
    /// * `Ok(Some(account))` - The reserved account, `sent_today` already incremented
    /// * `Ok(None)` - No active account has remaining capacity
    pub fn reserve<S: Storage>(&self, store: &mut S) -> Result<Option<SenderAccount>> {
        let mut accounts = store.list_senders()?;

        while let Some(candidate) = pick_account(&accounts).map(|a| a.id) {
            if store.increment_sent_today(candidate)? {
                let reserved = store.get_sender(candidate)?;
                if let Some(account) = &reserved {
                    tracing::debug!(
                        sender = %account.name,
                        sent_today = account.sent_today,
                        daily_limit = account.daily_limit,
                        "Sender reserved"
                    );
                }
                return Ok(reserved);
            }
            // Lost to a concurrent change; drop it and try the next one
            accounts.retain(|a| a.id != candidate);
        }

        Ok(None)
    }

    /// Records a dispatch outcome; `sent_today` was already counted by `reserve`
    pub fn record_outcome<S: Storage>(
        &self,
        store: &mut S,
        sender_id: i64,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        store.record_sender_outcome(sender_id, success, at)?;
        Ok(())
    }

    /// Deactivates every active account whose success rate fell below the threshold
    pub fn sweep<S: Storage>(&self, store: &mut S) -> Result<Vec<DisabledSender>> {
        let mut disabled = Vec::new();

        for account in store.list_senders()?.into_iter().filter(|a| a.active) {
            let health = self.health(&account);
            if health.healthy || health.samples < self.min_health_samples {
                continue;
            }

            let rate = health.success_rate.unwrap_or(0.0);
            let reason = format!(
                "Success rate {:.1}% below {:.1}% threshold ({} successes, {} failures)",
                rate * 100.0,
                self.health_threshold * 100.0,
                account.success_count,
                account.failure_count
            );
            store.deactivate_sender(account.id, &reason)?;
            tracing::warn!(sender = %account.name, reason = %reason, "Sender account disabled");

            disabled.push(DisabledSender {
                sender_id: account.id,
                name: account.name,
                reason,
            });
        }

        Ok(disabled)
    }

    /// Zeroes `sent_today` on every account
    pub fn reset_daily<S: Storage>(&self, store: &mut S) -> Result<usize> {
        let reset = store.reset_daily_counts()?;
        tracing::info!(accounts = reset, "Daily send counts reset");
        Ok(reset)
    }
}
