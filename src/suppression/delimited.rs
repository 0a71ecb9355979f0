//! `value,reason,source` text format for suppression import and export
//!
//! Fields are comma-separated; a field containing a comma, quote or line
//! break is wrapped in double quotes with inner quotes doubled. The first
//! line is a header.

use crate::state::{SuppressionKind, SuppressionSource};
use crate::storage::SuppressionEntry;

pub const HEADER: &str = "value,reason,source";

/// One parsed import row
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub kind: SuppressionKind,
    pub value: String,
    pub reason: Option<String>,
    pub source: SuppressionSource,
}

/// Splits text into records of fields, honoring quoted fields
fn parse_records(input: &str) -> Result<Vec<(usize, Vec<String>)>, String> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].trim().is_empty()) {
                    records.push((record_line, std::mem::take(&mut record)));
                }
                record.clear();
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(format!("line {}: unterminated quoted field", record_line));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push((record_line, record));
    }
    Ok(records)
}

/// Parses an import file
///
/// The kind is inferred from the value (`@` means email). A missing source
/// defaults to `import`.
///
/// # Returns
///
/// * `Ok(Vec<ImportRow>)` - Rows in file order, header skipped
/// * `Err(String)` - The first malformed line
pub fn parse_import(input: &str) -> Result<Vec<ImportRow>, String> {
    let mut rows = Vec::new();

    for (index, (line, fields)) in parse_records(input)?.into_iter().enumerate() {
        if index == 0 && fields.first().map(|f| f.trim().eq_ignore_ascii_case("value")).unwrap_or(false) {
            continue;
        }
        if fields.len() > 3 {
            return Err(format!("line {}: expected at most 3 fields, found {}", line, fields.len()));
        }

        let value = fields[0].trim().to_lowercase();
        if value.is_empty() {
            return Err(format!("line {}: empty value", line));
        }

        let reason = fields
            .get(1)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let source = match fields.get(2).map(|s| s.trim()).filter(|s| !s.is_empty()) {
            None => SuppressionSource::Import,
            Some(s) => SuppressionSource::from_db_string(s)
                .ok_or_else(|| format!("line {}: unknown source '{}'", line, s))?,
        };

        rows.push(ImportRow {
            kind: SuppressionKind::infer(&value),
            value,
            reason,
            source,
        });
    }

    Ok(rows)
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders entries in the import format
pub fn render_export(entries: &[SuppressionEntry]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');

    for entry in entries {
        out.push_str(&quote(&entry.value));
        out.push(',');
        out.push_str(&quote(entry.reason.as_deref().unwrap_or("")));
        out.push(',');
        out.push_str(entry.source.to_db_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_with_header_and_quotes() {
        let input = "value,reason,source\n\
                     Spam.com,\"Complained, twice\",manual\n\
                     ceo@example.com,\"Said \"\"stop\"\"\",\n\
                     \n\
                     other.org\n";
        let rows = parse_import(input).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].kind, SuppressionKind::Domain);
        assert_eq!(rows[0].value, "spam.com");
        assert_eq!(rows[0].reason.as_deref(), Some("Complained, twice"));
        assert_eq!(rows[0].source, SuppressionSource::Manual);

        assert_eq!(rows[1].kind, SuppressionKind::Email);
        assert_eq!(rows[1].reason.as_deref(), Some("Said \"stop\""));
        assert_eq!(rows[1].source, SuppressionSource::Import);

        assert_eq!(rows[2].value, "other.org");
        assert_eq!(rows[2].reason, None);
    }

    #[test]
    fn test_parse_without_header() {
        let rows = parse_import("a@b.com,bounced,auto-bounce").unwrap();
        assert_eq!(rows[0].source, SuppressionSource::AutoBounce);
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = parse_import("value,reason,source\nx.com,r,nonsense\n").unwrap_err();
        assert!(err.starts_with("line 2"));
        assert!(parse_import("\"unterminated").is_err());
        assert!(parse_import("a,b,c,d").is_err());
    }

    #[test]
    fn test_export_quotes_fields() {
        let entries = vec![SuppressionEntry {
            id: 1,
            kind: SuppressionKind::Domain,
            value: "spam.com".to_string(),
            reason: Some("Said \"no\", loudly".to_string()),
            source: SuppressionSource::Manual,
            active: true,
            created_at: Utc::now(),
        }];
        let text = render_export(&entries);
        assert_eq!(
            text,
            "value,reason,source\nspam.com,\"Said \"\"no\"\", loudly\",manual\n"
        );
        assert_eq!(parse_import(&text).unwrap()[0].reason.as_deref(), Some("Said \"no\", loudly"));
    }
}
