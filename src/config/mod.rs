//! Configuration module for the outreach pipeline
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every engine receives its section as an explicit value at
//! construction; nothing reads module-level tables at runtime.
//!
//! # Example
//!
//! ```no_run
//! use outreach_pipeline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("outreach.toml")).unwrap();
//! println!("Contact cooldown: {} days", config.suppression.contact_cooldown_days);
//! ```

pub mod defaults;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AiConfig, ComposeConfig, Config, CrawlerConfig, DatabaseConfig, ExtractionConfig,
    HostedCrawlerConfig, PageType, PageTypeEntry, PlatformSignature, ReviewConfig, RuleEntry,
    SenderEntry, SendingConfig, SuppressionConfig, UserAgentConfig, ValidationConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
