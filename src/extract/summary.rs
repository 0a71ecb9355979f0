//! Structural summary of an HTML document

use scraper::{ElementRef, Html, Selector};

/// Paragraphs at or below this many characters are layout noise
const MIN_PARAGRAPH_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkInfo {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub src: String,
    pub alt: Option<String>,
}

/// Structured view of a page or corpus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSummary {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub links: Vec<LinkInfo>,
    pub images: Vec<ImageInfo>,
    /// Words of visible text; scripts and styles excluded
    pub word_count: u64,
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_hidden_container(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template")
}

fn collect_visible_text(document: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| is_hidden_container(e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

/// Visible text of a document with whitespace collapsed
pub fn visible_text(html: &str) -> String {
    collect_visible_text(&Html::parse_document(html))
}

/// Parses an HTML document into a [`PageSummary`]
///
/// # Example
///
/// ```
/// use outreach_pipeline::extract::summarize;
///
/// let summary = summarize("<title>Acme</title><h2>Our team</h2><script>var x = 1;</script>");
/// assert_eq!(summary.title.as_deref(), Some("Acme"));
/// assert_eq!(summary.headings[0].level, 2);
/// assert_eq!(summary.word_count, 3);
/// ```
pub fn summarize(html: &str) -> PageSummary {
    let document = Html::parse_document(html);
    let mut summary = PageSummary::default();

    if let Ok(selector) = Selector::parse("title") {
        summary.title = document
            .select(&selector)
            .next()
            .and_then(|e| non_empty(&element_text(&e)));
    }

    if let Ok(selector) = Selector::parse("meta[name][content]") {
        summary.meta_description = document
            .select(&selector)
            .find(|e| {
                e.value()
                    .attr("name")
                    .map(|n| n.eq_ignore_ascii_case("description"))
                    .unwrap_or(false)
            })
            .and_then(|e| e.value().attr("content").and_then(non_empty));
    }

    if let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") {
        for element in document.select(&selector) {
            let level = element.value().name()[1..].parse::<u8>().unwrap_or(1);
            if let Some(text) = non_empty(&element_text(&element)) {
                summary.headings.push(Heading { level, text });
            }
        }
    }

    if let Ok(selector) = Selector::parse("p") {
        summary.paragraphs = document
            .select(&selector)
            .map(|e| element_text(&e))
            .filter(|t| t.chars().count() > MIN_PARAGRAPH_CHARS)
            .collect();
    }

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                summary.links.push(LinkInfo {
                    href: href.trim().to_string(),
                    text: element_text(&element),
                });
            }
        }
    }

    if let Ok(selector) = Selector::parse("img[src]") {
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                summary.images.push(ImageInfo {
                    src: src.trim().to_string(),
                    alt: element.value().attr("alt").and_then(non_empty),
                });
            }
        }
    }

    summary.word_count = collect_visible_text(&document).split_whitespace().count() as u64;
    summary
}
