//! Markdown site reports
//!
//! A report shows one site's crawl signals, extracted contacts and, when
//! supplied, how each qualification rule judged it.

use crate::qualification::QualificationReport;
use crate::storage::{ContactRecord, SiteRecord};
use crate::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a site report to a file
///
/// # Arguments
///
/// * `site` - The site being reported
/// * `contacts` - Contacts extracted from the site
/// * `qualification` - Rule evaluation, if one was run
/// * `output_path` - Path where the markdown file should be written
pub fn write_site_report(
    site: &SiteRecord,
    contacts: &[ContactRecord],
    qualification: Option<&QualificationReport>,
    output_path: &Path,
) -> Result<()> {
    let markdown = format_site_report(site, contacts, qualification);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Formats a site report as markdown
pub fn format_site_report(
    site: &SiteRecord,
    contacts: &[ContactRecord],
    qualification: Option<&QualificationReport>,
) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", site.domain));

    md.push_str("## Site\n\n");
    md.push_str(&format!("- **URL**: {}\n", site.url));
    md.push_str(&format!("- **Status**: {}\n", site.status));
    md.push_str(&format!("- **Crawl attempts**: {}\n", site.attempts));
    if let Some(title) = &site.title {
        md.push_str(&format!("- **Title**: {}\n", title));
    }
    if let Some(pages) = site.page_count {
        md.push_str(&format!("- **Pages**: {}\n", pages));
    }
    if let Some(words) = site.word_count {
        md.push_str(&format!("- **Words**: {}\n", words));
    }
    if let Some(platform) = &site.detected_platform {
        md.push_str(&format!("- **Platform**: {}\n", platform));
    }
    if let Some(at) = site.last_crawled_at {
        md.push_str(&format!("- **Last crawled**: {}\n", at.to_rfc3339()));
    }
    if let Some(error) = &site.last_error {
        md.push_str(&format!("- **Last error**: {}\n", error));
    }
    md.push_str(&format!("- **Qualified**: {}\n", if site.qualified { "yes" } else { "no" }));
    md.push_str(&format!("- **Contacted**: {}\n\n", if site.contacted { "yes" } else { "no" }));

    md.push_str(&format!("## Contacts ({})\n\n", contacts.len()));
    if contacts.is_empty() {
        md.push_str("No contacts found.\n\n");
    } else {
        md.push_str("| Email | Name | Position | Source | Validation |\n");
        md.push_str("|-------|------|----------|--------|------------|\n");
        for contact in contacts {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                escape_cell(&contact.email),
                escape_cell(contact.name.as_deref().unwrap_or("")),
                escape_cell(contact.position.as_deref().unwrap_or("")),
                contact.source_type,
                contact.validation
            ));
        }
        md.push('\n');
    }

    if let Some(report) = qualification {
        md.push_str("## Qualification\n\n");
        if report.rules.is_empty() {
            md.push_str("No active rules.\n\n");
        }
        for rule in &report.rules {
            md.push_str(&format!(
                "### {} ({})\n\n",
                rule.rule,
                if rule.passed { "passed" } else { "failed" }
            ));
            for result in &rule.results {
                md.push_str(&format!(
                    "- [{}] `{}`: {}\n",
                    if result.matched { "x" } else { " " },
                    result.criterion,
                    result.explanation
                ));
            }
            md.push('\n');
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qualification::RuleOutcome;
    use crate::qualification::CriterionResult;
    use crate::state::{SiteStatus, SourceType, ValidationStatus};
    use chrono::Utc;

    fn site() -> SiteRecord {
        SiteRecord {
            id: 1,
            domain: "example.com".to_string(),
            url: "https://example.com/".to_string(),
            status: SiteStatus::Completed,
            attempts: 1,
            page_count: Some(4),
            word_count: Some(1200),
            detected_platform: Some("Shopify".to_string()),
            content_snapshot: None,
            title: Some("Example Store".to_string()),
            qualified: true,
            contacted: false,
            last_error: None,
            last_crawled_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_sections() {
        let contact = ContactRecord {
            id: 1,
            site_id: 1,
            email: "sales@example.com".to_string(),
            name: Some("Jo | Sales".to_string()),
            position: None,
            source_type: SourceType::Footer,
            source_url: None,
            snippet: None,
            validation: ValidationStatus::Valid,
            validation_reason: None,
            validated_at: None,
            mx_host: None,
            priority: 0,
            contacted: false,
            contact_count: 0,
            last_contacted_at: None,
            created_at: Utc::now(),
        };
        let report = QualificationReport {
            site_id: 1,
            qualified: true,
            rules: vec![RuleOutcome {
                rule: "stores".to_string(),
                passed: true,
                results: vec![CriterionResult {
                    criterion: "platforms",
                    matched: true,
                    explanation: "platform Shopify is allowed".to_string(),
                }],
            }],
        };

        let md = format_site_report(&site(), &[contact], Some(&report));
        assert!(md.starts_with("# example.com\n"));
        assert!(md.contains("- **Platform**: Shopify"));
        assert!(md.contains("| sales@example.com | Jo \\| Sales |  | footer | valid |"));
        assert!(md.contains("### stores (passed)"));
        assert!(md.contains("- [x] `platforms`: platform Shopify is allowed"));
    }

    #[test]
    fn test_report_without_contacts() {
        let md = format_site_report(&site(), &[], None);
        assert!(md.contains("No contacts found."));
        assert!(!md.contains("## Qualification"));
    }

    #[test]
    fn test_write_site_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.md");

        write_site_report(&site(), &[], None, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format_site_report(&site(), &[], None));
    }
}
