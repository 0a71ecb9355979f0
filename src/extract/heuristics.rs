//! Heuristic classification for discovered contacts and crawled pages
//!
//! Every table here comes from an [`ExtractionConfig`]; nothing is hard-coded.

use crate::config::{ExtractionConfig, PageType, PlatformSignature};
use crate::state::SourceType;
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};

/// One ordered name heuristic: a pattern and how to pull the name out of it
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::Regex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    fn extract(&self, context: &str) -> Option<String> {
        self.regex
            .captures(context)
            .and_then(|caps| caps.name("name"))
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Infers names, positions and source types from nearby text and page URLs
pub struct ContactHeuristics {
    name_patterns: Vec<NamePattern>,
    positions: Vec<(String, Regex)>,
    page_types: Vec<(PageType, Vec<String>)>,
    header_markers: Vec<String>,
    footer_markers: Vec<String>,
}

impl ContactHeuristics {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        let name_patterns = config
            .name_patterns
            .iter()
            .map(|p| NamePattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut positions = Vec::with_capacity(config.position_titles.len());
        for title in &config.position_titles {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(title));
            let regex = Regex::new(&pattern).map_err(|e| ConfigError::Regex {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            positions.push((title.clone(), regex));
        }

        let lower = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect();

        Ok(Self {
            name_patterns,
            positions,
            page_types: config
                .page_types
                .iter()
                .map(|entry| (entry.page_type, lower(&entry.keywords)))
                .collect(),
            header_markers: lower(&config.header_markers),
            footer_markers: lower(&config.footer_markers),
        })
    }

    /// First name pattern that matches wins
    pub fn infer_name(&self, context: &str) -> Option<String> {
        self.name_patterns.iter().find_map(|p| p.extract(context))
    }

    /// First title in table order that occurs as a whole word wins
    pub fn infer_position(&self, context: &str) -> Option<String> {
        self.positions
            .iter()
            .find(|(_, regex)| regex.is_match(context))
            .map(|(title, _)| title.clone())
    }

    /// Page type of a URL from the first table row with a keyword in its path
    pub fn page_type(&self, page_url: &str) -> Option<PageType> {
        let lower = page_url.to_lowercase();
        let path = match url::Url::parse(&lower) {
            Ok(url) => url.path().to_string(),
            Err(_) => lower,
        };

        self.page_types
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| path.contains(k.as_str())))
            .map(|(page_type, _)| *page_type)
    }

    /// Classifies where on the site an address was found
    pub fn classify_source(&self, page_url: Option<&str>) -> SourceType {
        let Some(page_url) = page_url else {
            return SourceType::Body;
        };

        match self.page_type(page_url) {
            Some(PageType::Contact) => return SourceType::ContactPage,
            Some(PageType::About) => return SourceType::AboutPage,
            Some(PageType::Team) => return SourceType::TeamPage,
            _ => {}
        }

        let lower = page_url.to_lowercase();
        if self.header_markers.iter().any(|m| lower.contains(m.as_str())) {
            SourceType::Header
        } else if self.footer_markers.iter().any(|m| lower.contains(m.as_str())) {
            SourceType::Footer
        } else {
            SourceType::Body
        }
    }
}

/// Identifies the site builder from the generator meta tag, then source markers
pub fn detect_platform(html: &str, signatures: &[PlatformSignature]) -> Option<String> {
    let document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse("meta[name][content]") {
        let generator = document
            .select(&selector)
            .find(|e| {
                e.value()
                    .attr("name")
                    .map(|n| n.eq_ignore_ascii_case("generator"))
                    .unwrap_or(false)
            })
            .and_then(|e| e.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if let Some(generator) = generator {
            let lower = generator.to_lowercase();
            if let Some(sig) = signatures
                .iter()
                .find(|s| lower.contains(&s.name.to_lowercase()))
            {
                return Some(sig.name.clone());
            }
            return generator.split_whitespace().next().map(|s| s.to_string());
        }
    }

    let lower = html.to_lowercase();
    signatures
        .iter()
        .find(|sig| sig.markers.iter().any(|m| lower.contains(&m.to_lowercase())))
        .map(|sig| sig.name.clone())
}
