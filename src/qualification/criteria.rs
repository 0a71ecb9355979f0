//! Typed qualification criteria
//!
//! Rule criteria arrive as a JSON object of criterion-name → value. Values may
//! be loosely typed (`"20"` for 20, `"[\"a\",\"b\"]"` or `"a, b"` for a list)
//! and are normalized here before any site is evaluated.

use crate::storage::SiteRecord;
use serde_json::Value;
use thiserror::Error;

/// Why a criterion could not be parsed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CriterionError {
    #[error("Unknown criterion '{0}'")]
    Unknown(String),

    #[error("Invalid value for '{criterion}': {message}")]
    InvalidValue { criterion: String, message: String },
}

/// One qualification test with its typed parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    MinPages(u64),
    MaxPages(u64),
    Platforms(Vec<String>),
    MinWordCount(u64),
    MaxWordCount(u64),
    RequiredKeywords(Vec<String>),
    ExcludedKeywords(Vec<String>),
    RequiredUrls(Vec<String>),
}

/// Outcome of one criterion against one site
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionResult {
    pub criterion: &'static str,
    pub matched: bool,
    pub explanation: String,
}

fn invalid(criterion: &str, message: impl Into<String>) -> CriterionError {
    CriterionError::InvalidValue {
        criterion: criterion.to_string(),
        message: message.into(),
    }
}

/// Accepts JSON numbers and number-looking strings
fn parse_count(criterion: &str, value: &Value) -> Result<u64, CriterionError> {
    let from_f64 = |f: f64| {
        if f.is_finite() && f >= 0.0 && f.fract() == 0.0 {
            Ok(f as u64)
        } else {
            Err(invalid(criterion, format!("{} is not a non-negative whole number", f)))
        }
    };

    match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => Ok(v),
            None => from_f64(n.as_f64().unwrap_or(-1.0)),
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<u64>() {
                Ok(v) => Ok(v),
                Err(_) => match s.parse::<f64>() {
                    Ok(f) => from_f64(f),
                    Err(_) => Err(invalid(criterion, format!("'{}' is not a number", s))),
                },
            }
        }
        other => Err(invalid(criterion, format!("expected a number, got {}", other))),
    }
}

/// Accepts JSON arrays, JSON-encoded arrays in a string, and comma-separated strings
fn parse_list(criterion: &str, value: &Value) -> Result<Vec<String>, CriterionError> {
    let items: Vec<String> = match value {
        Value::Array(values) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(invalid(criterion, format!("unexpected list item {}", other))),
            })
            .collect::<Result<_, _>>()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                let decoded: Value = serde_json::from_str(trimmed)
                    .map_err(|e| invalid(criterion, format!("malformed JSON list: {}", e)))?;
                return parse_list(criterion, &decoded);
            }
            trimmed.split(',').map(|s| s.to_string()).collect()
        }
        other => return Err(invalid(criterion, format!("expected a list, got {}", other))),
    };

    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if items.is_empty() {
        return Err(invalid(criterion, "list is empty"));
    }
    Ok(items)
}

fn contains_ci(haystack_lower: &str, needle: &str) -> bool {
    haystack_lower.contains(&needle.to_lowercase())
}

impl Criterion {
    /// Parses one `name = value` pair of a rule
    ///
    /// # Example
    ///
    /// ```
    /// use outreach_pipeline::qualification::Criterion;
    /// use serde_json::json;
    ///
    /// assert_eq!(Criterion::from_raw("min_pages", &json!("3")).unwrap(), Criterion::MinPages(3));
    /// assert_eq!(
    ///     Criterion::from_raw("platforms", &json!("WordPress, Wix")).unwrap(),
    ///     Criterion::Platforms(vec!["WordPress".to_string(), "Wix".to_string()])
    /// );
    /// ```
    pub fn from_raw(name: &str, value: &Value) -> Result<Self, CriterionError> {
        match name {
            "min_pages" => Ok(Self::MinPages(parse_count(name, value)?)),
            "max_pages" => Ok(Self::MaxPages(parse_count(name, value)?)),
            "platforms" => Ok(Self::Platforms(parse_list(name, value)?)),
            "min_word_count" => Ok(Self::MinWordCount(parse_count(name, value)?)),
            "max_word_count" => Ok(Self::MaxWordCount(parse_count(name, value)?)),
            "required_keywords" => Ok(Self::RequiredKeywords(parse_list(name, value)?)),
            "excluded_keywords" => Ok(Self::ExcludedKeywords(parse_list(name, value)?)),
            "required_urls" => Ok(Self::RequiredUrls(parse_list(name, value)?)),
            other => Err(CriterionError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MinPages(_) => "min_pages",
            Self::MaxPages(_) => "max_pages",
            Self::Platforms(_) => "platforms",
            Self::MinWordCount(_) => "min_word_count",
            Self::MaxWordCount(_) => "max_word_count",
            Self::RequiredKeywords(_) => "required_keywords",
            Self::ExcludedKeywords(_) => "excluded_keywords",
            Self::RequiredUrls(_) => "required_urls",
        }
    }

    /// Evaluates the criterion against a site's derived signals
    ///
    /// Missing page and word counts count as 0. A missing platform fails the
    /// platform test; a missing snapshot fails required keywords and URLs and
    /// passes excluded keywords.
    pub fn evaluate(&self, site: &SiteRecord) -> CriterionResult {
        let pages = site.page_count.unwrap_or(0) as u64;
        let words = site.word_count.unwrap_or(0);
        let snapshot = site.content_snapshot.as_deref().map(|s| s.to_lowercase());

        let (matched, explanation) = match self {
            Self::MinPages(min) => (
                pages >= *min,
                format!("page count {} vs minimum {}", pages, min),
            ),
            Self::MaxPages(max) => (
                pages <= *max,
                format!("page count {} vs maximum {}", pages, max),
            ),
            Self::MinWordCount(min) => (
                words >= *min,
                format!("word count {} vs minimum {}", words, min),
            ),
            Self::MaxWordCount(max) => (
                words <= *max,
                format!("word count {} vs maximum {}", words, max),
            ),
            Self::Platforms(allowed) => match &site.detected_platform {
                None => (false, "no platform detected".to_string()),
                Some(platform) => {
                    let ok = allowed.iter().any(|p| p.eq_ignore_ascii_case(platform));
                    let verb = if ok { "is" } else { "is not" };
                    (
                        ok,
                        format!("platform {} {} in [{}]", platform, verb, allowed.join(", ")),
                    )
                }
            },
            Self::RequiredKeywords(keywords) => match &snapshot {
                None => (false, "no content snapshot".to_string()),
                Some(text) => {
                    let missing: Vec<&str> = keywords
                        .iter()
                        .filter(|k| !contains_ci(text, k))
                        .map(|k| k.as_str())
                        .collect();
                    if missing.is_empty() {
                        (true, "all required keywords present".to_string())
                    } else {
                        (false, format!("missing keywords: {}", missing.join(", ")))
                    }
                }
            },
            Self::ExcludedKeywords(keywords) => match &snapshot {
                None => (true, "no content snapshot".to_string()),
                Some(text) => {
                    let found: Vec<&str> = keywords
                        .iter()
                        .filter(|k| contains_ci(text, k))
                        .map(|k| k.as_str())
                        .collect();
                    if found.is_empty() {
                        (true, "no excluded keywords present".to_string())
                    } else {
                        (false, format!("excluded keywords present: {}", found.join(", ")))
                    }
                }
            },
            Self::RequiredUrls(urls) => match &snapshot {
                None => (false, "no content snapshot".to_string()),
                Some(text) => {
                    let missing: Vec<&str> = urls
                        .iter()
                        .filter(|u| !contains_ci(text, u))
                        .map(|u| u.as_str())
                        .collect();
                    if missing.is_empty() {
                        (true, "all required URLs present".to_string())
                    } else {
                        (false, format!("missing URLs: {}", missing.join(", ")))
                    }
                }
            },
        };

        CriterionResult {
            criterion: self.name(),
            matched,
            explanation,
        }
    }
}
