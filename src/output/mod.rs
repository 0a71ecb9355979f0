//! Output module for reports and statistics
//!
//! This module handles:
//! - Markdown reports for a single site
//! - Pipeline-wide statistics for the `stats` command

mod markdown;
pub mod stats;

pub use markdown::{format_site_report, write_site_report};
pub use stats::{format_statistics, load_statistics, print_statistics, PipelineStatistics, SenderSummary};
