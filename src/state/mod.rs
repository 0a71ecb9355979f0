//! State module for tracking pipeline progress
//!
//! This module provides the persisted lifecycle enums of the pipeline.
//!
//! # Components
//!
//! - `SiteStatus`: crawl lifecycle of a registered site
//! - `SourceType` / `ValidationStatus`: provenance and validation of a contact
//! - `DraftState`: the review workflow state machine
//! - `SuppressionKind` / `SuppressionSource` / `SendOutcome`: blacklist and ledger values

mod contact_status;
mod draft_state;
mod ledger;
mod site_status;

// Re-export main types
pub use contact_status::{SourceType, ValidationStatus};
pub use draft_state::DraftState;
pub use ledger::{SendOutcome, SuppressionKind, SuppressionSource};
pub use site_status::SiteStatus;
