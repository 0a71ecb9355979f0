/// Review draft state definitions
///
/// Drafts move pending -> approved/rejected -> sent/failed. Rejected and
/// failed drafts only return to pending through an explicit requeue.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftState {
    // ===== Awaiting a reviewer =====
    /// Generated and waiting for review
    Pending,

    // ===== Reviewed =====
    /// Approved by a reviewer, eligible for dispatch
    Approved,

    /// Rejected by a reviewer
    Rejected,

    // ===== Dispatched =====
    /// Delivered to the mail collaborator
    Sent,

    /// Dispatch was attempted and failed
    Failed,
}

impl DraftState {
    /// Returns true if the workflow allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: DraftState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Sent)
                | (Self::Approved, Self::Failed)
                | (Self::Rejected, Self::Pending)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Terminal drafts are the only ones retention cleanup may purge
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Sent | Self::Failed)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Approved,
            Self::Rejected,
            Self::Sent,
            Self::Failed,
        ]
    }
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(DraftState::Pending.can_transition_to(DraftState::Approved));
        assert!(DraftState::Pending.can_transition_to(DraftState::Rejected));
        assert!(DraftState::Approved.can_transition_to(DraftState::Sent));
        assert!(DraftState::Approved.can_transition_to(DraftState::Failed));
        assert!(DraftState::Rejected.can_transition_to(DraftState::Pending));
        assert!(DraftState::Failed.can_transition_to(DraftState::Pending));
    }

    #[test]
    fn test_finished_drafts_cannot_be_sent_again() {
        for state in [DraftState::Sent, DraftState::Rejected, DraftState::Failed] {
            assert!(!state.can_transition_to(DraftState::Sent));
            assert!(!state.can_transition_to(DraftState::Approved));
        }
    }

    #[test]
    fn test_sent_is_final() {
        for next in DraftState::all_states() {
            assert!(!DraftState::Sent.can_transition_to(next));
        }
    }

    #[test]
    fn test_pending_cannot_skip_review() {
        assert!(!DraftState::Pending.can_transition_to(DraftState::Sent));
        assert!(!DraftState::Pending.can_transition_to(DraftState::Failed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(DraftState::Rejected.is_terminal());
        assert!(DraftState::Sent.is_terminal());
        assert!(DraftState::Failed.is_terminal());
        assert!(!DraftState::Pending.is_terminal());
        assert!(!DraftState::Approved.is_terminal());
    }

    #[test]
    fn test_db_string_roundtrip() {
        for state in DraftState::all_states() {
            assert_eq!(DraftState::from_db_string(state.to_db_string()), Some(state));
        }
    }
}
