//! Integration tests for the outreach pipeline
//!
//! HTTP collaborators (sites, the hosted crawler, the text generator) are
//! served by wiremock; DNS and mail transport are faked in-process.

mod crawl_tests;
mod generator_tests;
mod hosted_tests;
mod pipeline_tests;
