//! Contact discovery over a crawl corpus

use crate::extract::heuristics::ContactHeuristics;
use crate::extract::summary::visible_text;
use crate::storage::NewContact;
use crate::validation::is_valid_email;
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;

const PAGE_MARKER_START: &str = "<!-- page: ";
const PAGE_MARKER_END: &str = " -->";

const EMAIL_PATTERN: &str = r"(?i)\b[a-z0-9][a-z0-9._%+\-]*@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,}\b";

/// `logo@2x.png`, `hero@3x-large.jpg`
const RETINA_PATTERN: &str = r"(?i)@\d+x[-._]";

/// One page section of a corpus
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusPage<'a> {
    /// URL carried by the page marker; `None` for text before the first marker
    pub url: Option<&'a str>,
    pub html: &'a str,
}

/// Splits a corpus on its `<!-- page: URL -->` markers
///
/// A corpus without markers is returned as a single page with no URL.
pub fn split_corpus(corpus: &str) -> Vec<CorpusPage<'_>> {
    let mut pages = Vec::new();
    let mut rest = corpus;
    let mut current_url: Option<&str> = None;

    loop {
        match rest.find(PAGE_MARKER_START) {
            Some(start) => {
                let before = &rest[..start];
                if current_url.is_some() || !before.trim().is_empty() {
                    pages.push(CorpusPage {
                        url: current_url,
                        html: before,
                    });
                }

                let after_start = &rest[start + PAGE_MARKER_START.len()..];
                match after_start.find(PAGE_MARKER_END) {
                    Some(end) => {
                        current_url = Some(after_start[..end].trim());
                        rest = &after_start[end + PAGE_MARKER_END.len()..];
                    }
                    None => {
                        pages.push(CorpusPage {
                            url: current_url,
                            html: after_start,
                        });
                        return pages;
                    }
                }
            }
            None => {
                if current_url.is_some() || !rest.trim().is_empty() {
                    pages.push(CorpusPage {
                        url: current_url,
                        html: rest,
                    });
                }
                return pages;
            }
        }
    }
}

/// A candidate address before filtering
struct Candidate {
    email: String,
    context: String,
}

/// Finds addresses, filters junk and infers who they belong to
pub struct ContactDiscovery {
    email_regex: Regex,
    retina_regex: Regex,
    blocked_extensions: Vec<String>,
    context_chars: usize,
    snippet_chars: usize,
}

impl ContactDiscovery {
    pub fn new(
        blocked_extensions: &[String],
        context_chars: usize,
        snippet_chars: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            email_regex: compile(EMAIL_PATTERN)?,
            retina_regex: compile(RETINA_PATTERN)?,
            blocked_extensions: blocked_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            context_chars,
            snippet_chars,
        })
    }

    /// True for matches that look like asset file names rather than mailboxes
    fn is_junk(&self, email: &str) -> bool {
        if self.retina_regex.is_match(email) {
            return true;
        }
        match email.rsplit_once('.') {
            Some((_, ext)) => self.blocked_extensions.iter().any(|b| b == ext),
            None => false,
        }
    }

    fn mailto_candidates(&self, html: &str) -> Vec<Candidate> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(rest) = strip_mailto(href.trim()) else {
                continue;
            };

            let address = rest.split('?').next().unwrap_or_default();
            let address = address.split(',').next().unwrap_or_default().trim();
            if address.is_empty() {
                continue;
            }

            candidates.push(Candidate {
                email: address.replace("%40", "@").to_lowercase(),
                context: element.text().flat_map(|t| t.split_whitespace()).collect::<Vec<_>>().join(" "),
            });
        }
        candidates
    }

    fn text_candidates(&self, html: &str, text: &str) -> Vec<Candidate> {
        self.email_regex
            .find_iter(html)
            .map(|m| {
                let email = m.as_str();
                let context = match text.find(email) {
                    Some(pos) => window(text, pos, pos + email.len(), self.context_chars),
                    None => "",
                };
                Candidate {
                    email: email.to_lowercase(),
                    context: context.to_string(),
                }
            })
            .collect()
    }

    /// Discovers contacts in a corpus
    ///
    /// # Arguments
    ///
    /// * `corpus` - Concatenated page bodies with page markers
    /// * `heuristics` - Name, position and source classification tables
    /// * `known` - Lower-cased addresses the site already has
    ///
    /// # Returns
    ///
    /// New contacts in discovery order, unique by lower-cased address
    pub fn discover(
        &self,
        corpus: &str,
        heuristics: &ContactHeuristics,
        known: &HashSet<String>,
    ) -> Vec<NewContact> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut contacts = Vec::new();

        for page in split_corpus(corpus) {
            let text = visible_text(page.html);
            let source_type = heuristics.classify_source(page.url);

            let mut candidates = self.mailto_candidates(page.html);
            candidates.extend(self.text_candidates(page.html, &text));

            for candidate in candidates {
                if known.contains(&candidate.email) || seen.contains(&candidate.email) {
                    continue;
                }
                if !is_valid_email(&candidate.email) || self.is_junk(&candidate.email) {
                    tracing::debug!(email = %candidate.email, "Discarding email-shaped match");
                    continue;
                }
                seen.insert(candidate.email.clone());

                // Addresses must not feed the name and title matchers
                let context = self.email_regex.replace_all(&candidate.context, " ");
                let name = heuristics.infer_name(&context);
                let position = heuristics.infer_position(&context);
                let snippet = truncate_chars(candidate.context.trim(), self.snippet_chars);

                contacts.push(NewContact {
                    email: candidate.email,
                    name,
                    position,
                    source_type,
                    source_url: page.url.map(|u| u.to_string()),
                    snippet: if snippet.is_empty() { None } else { Some(snippet) },
                });
            }
        }

        contacts
    }
}

/// The part after a case-insensitive `mailto:` scheme
fn strip_mailto(href: &str) -> Option<&str> {
    const SCHEME: &str = "mailto:";
    match href.get(..SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => Some(&href[SCHEME.len()..]),
        _ => None,
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Text within `radius` characters on each side of `start..end`
fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[from..to]
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
