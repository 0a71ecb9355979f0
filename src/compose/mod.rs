//! Draft composition
//!
//! Templates use `{{placeholder}}` markers. Recognized names are `name`,
//! `first_name`, `position`, `domain`, `site_title` and `url`; unknown
//! markers are left untouched. Templates flagged `use_ai` are rewritten by a
//! [`TextGenerator`], and any generation problem falls back to the rendered
//! static text.

mod generator;

pub use generator::{parse_generated, GeneratedText, GenerationRequest, OpenAiGenerator, TextGenerator};

use crate::config::ComposeConfig;
use crate::review::{DraftContent, ReviewQueue};
use crate::storage::{ContactRecord, DraftRecord, SiteRecord, Storage, TemplateRecord};
use crate::{lock_storage, OutreachError, Result, SharedStorage};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Environment variable {0} with the AI API key is not set")]
    MissingApiKey(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Text generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Placeholder values for one contact on one site
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholders {
    pub name: String,
    pub first_name: String,
    pub position: String,
    pub domain: String,
    pub site_title: String,
    pub url: String,
}

impl Placeholders {
    pub fn new(contact: &ContactRecord, site: &SiteRecord) -> Self {
        let name = contact.name.clone().unwrap_or_else(|| "there".to_string());
        let first_name = name.split_whitespace().next().unwrap_or("there").to_string();
        Self {
            name,
            first_name,
            position: contact.position.clone().unwrap_or_default(),
            domain: site.domain.clone(),
            site_title: site.title.clone().unwrap_or_else(|| site.domain.clone()),
            url: site.url.clone(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(&self.name),
            "first_name" => Some(&self.first_name),
            "position" => Some(&self.position),
            "domain" => Some(&self.domain),
            "site_title" => Some(&self.site_title),
            "url" => Some(&self.url),
            _ => None,
        }
    }

    /// Substitutes every known `{{key}}` marker in `text`
    ///
    /// # Example
    ///
    /// ```
    /// use outreach_pipeline::compose::Placeholders;
    ///
    /// let values = Placeholders {
    ///     name: "Ana Lima".to_string(),
    ///     first_name: "Ana".to_string(),
    ///     position: String::new(),
    ///     domain: "bakery.test".to_string(),
    ///     site_title: "Lima Bakery".to_string(),
    ///     url: "https://bakery.test/".to_string(),
    /// };
    /// assert_eq!(values.render("Hi {{ first_name }}, {{unknown}}"), "Hi Ana, {{unknown}}");
    /// ```
    pub fn render(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            match after.find("}}") {
                Some(close) => {
                    let key = after[..close].trim();
                    match self.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[open..open + 2 + close + 2]),
                    }
                    rest = &after[close + 2..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub struct DraftComposer {
    max_excerpt_chars: usize,
    timeout: Duration,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl DraftComposer {
    pub fn new(config: &ComposeConfig, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            max_excerpt_chars: config.max_excerpt_chars,
            timeout: Duration::from_secs(config.generation_timeout_secs),
            generator,
        }
    }

    /// Renders a template for a contact, using AI generation when the
    /// template asks for it and a generator is configured
    pub async fn compose(
        &self,
        template: &TemplateRecord,
        contact: &ContactRecord,
        site: &SiteRecord,
    ) -> DraftContent {
        let values = Placeholders::new(contact, site);
        let mut content = DraftContent {
            template_id: Some(template.id),
            subject: values.render(&template.subject),
            body: values.render(&template.body),
            preheader: template.preheader.as_deref().map(|p| values.render(p)),
            ai_assisted: false,
        };

        if !template.use_ai {
            return content;
        }
        let Some(generator) = &self.generator else {
            tracing::warn!(template = %template.name, "Template wants AI text but no generator is configured");
            return content;
        };

        let request = GenerationRequest {
            instructions: template.ai_instructions.clone().unwrap_or_default(),
            excerpt: truncate_chars(
                site.content_snapshot.as_deref().unwrap_or(""),
                self.max_excerpt_chars,
            ),
            url: site.url.clone(),
            site_title: site.title.clone(),
            platform: site.detected_platform.clone(),
            recipient_name: contact.name.clone(),
            static_subject: content.subject.clone(),
            static_body: content.body.clone(),
        };

        let generated = match tokio::time::timeout(self.timeout, generator.generate(&request)).await {
            Ok(Ok(generated)) => generated,
            Ok(Err(e)) => {
                tracing::warn!(contact_id = contact.id, error = %e, "Generation failed, using template text");
                return content;
            }
            Err(_) => {
                tracing::warn!(
                    contact_id = contact.id,
                    error = %ComposeError::Timeout(self.timeout),
                    "Generation failed, using template text"
                );
                return content;
            }
        };

        if generated.body.trim().is_empty() {
            tracing::warn!(contact_id = contact.id, "Generator returned an empty body, using template text");
            return content;
        }

        content.body = generated.body;
        if let Some(subject) = generated.subject.filter(|s| !s.trim().is_empty()) {
            content.subject = subject;
        }
        content.ai_assisted = true;
        content
    }
}

/// Composes a draft for a contact from a named template and queues it
///
/// The store lock is released while the generator runs.
pub async fn compose_draft(
    storage: &SharedStorage,
    composer: &DraftComposer,
    queue: &ReviewQueue,
    contact_id: i64,
    template_name: &str,
    force_priority: Option<u8>,
) -> Result<DraftRecord> {
    let (template, contact, site) = {
        let store = lock_storage(storage)?;
        let template = store
            .get_template_by_name(template_name)?
            .ok_or_else(|| ComposeError::TemplateNotFound(template_name.to_string()))?;
        let contact = store
            .get_contact(contact_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("contact {}", contact_id)))?;
        let site = store
            .get_site(contact.site_id)?
            .ok_or_else(|| OutreachError::NotFound(format!("site {}", contact.site_id)))?;
        (template, contact, site)
    };

    let content = composer.compose(&template, &contact, &site).await;

    let mut store = lock_storage(storage)?;
    queue.submit(&mut *store, contact_id, content, force_priority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewConfig;
    use crate::state::{SiteStatus, SourceType, ValidationStatus};
    use crate::storage::{NewContact, NewTemplate, SqliteStorage};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::Mutex as StdMutex;

    struct ScriptedGenerator {
        reply: std::result::Result<GeneratedText, String>,
        delay: Duration,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        fn replying(subject: Option<&str>, body: &str) -> Self {
            Self {
                reply: Ok(GeneratedText {
                    subject: subject.map(str::to_string),
                    body: body.to_string(),
                }),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> std::result::Result<GeneratedText, ComposeError> {
            self.seen.lock().push(request.clone());
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map_err(ComposeError::Generation)
        }
    }

    fn site() -> SiteRecord {
        SiteRecord {
            id: 1,
            domain: "bakery.test".to_string(),
            url: "https://bakery.test/".to_string(),
            status: SiteStatus::Completed,
            attempts: 1,
            page_count: Some(3),
            word_count: Some(900),
            detected_platform: Some("WordPress".to_string()),
            content_snapshot: Some("x".repeat(50)),
            title: Some("Lima Bakery".to_string()),
            qualified: true,
            contacted: false,
            last_error: None,
            last_crawled_at: None,
            created_at: Utc::now(),
        }
    }

    fn contact() -> ContactRecord {
        ContactRecord {
            id: 7,
            site_id: 1,
            email: "ana@bakery.test".to_string(),
            name: Some("Ana Lima".to_string()),
            position: Some("Owner".to_string()),
            source_type: SourceType::ContactPage,
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
        }
    }

    fn template(use_ai: bool) -> TemplateRecord {
        TemplateRecord {
            id: 3,
            name: "intro".to_string(),
            subject: "About {{site_title}}".to_string(),
            body: "Hi {{first_name}}, I looked at {{url}}.".to_string(),
            preheader: Some("For the {{position}}".to_string()),
            use_ai,
            ai_instructions: Some("Be brief".to_string()),
        }
    }

    fn config() -> ComposeConfig {
        ComposeConfig {
            max_excerpt_chars: 10,
            generation_timeout_secs: 5,
        }
    }

    #[test]
    fn test_placeholder_defaults() {
        let mut c = contact();
        c.name = None;
        let mut s = site();
        s.title = None;
        let values = Placeholders::new(&c, &s);
        assert_eq!(values.render("Hi {{name}} at {{site_title}}"), "Hi there at bakery.test");
        assert_eq!(values.render("broken {{name"), "broken {{name");
    }

    #[tokio::test]
    async fn test_static_render() {
        let composer = DraftComposer::new(&config(), None);
        let content = composer.compose(&template(false), &contact(), &site()).await;
        assert_eq!(content.subject, "About Lima Bakery");
        assert_eq!(content.body, "Hi Ana, I looked at https://bakery.test/.");
        assert_eq!(content.preheader.as_deref(), Some("For the Owner"));
        assert!(!content.ai_assisted);
    }

    #[tokio::test]
    async fn test_generated_text_replaces_static() {
        let generator = Arc::new(ScriptedGenerator::replying(Some("Fresh idea"), "Generated body"));
        let composer = DraftComposer::new(&config(), Some(generator.clone()));

        let content = composer.compose(&template(true), &contact(), &site()).await;
        assert_eq!(content.subject, "Fresh idea");
        assert_eq!(content.body, "Generated body");
        assert!(content.ai_assisted);

        let seen = generator.seen.lock();
        assert_eq!(seen[0].excerpt.len(), 10);
        assert_eq!(seen[0].platform.as_deref(), Some("WordPress"));
        assert_eq!(seen[0].recipient_name.as_deref(), Some("Ana Lima"));
    }

    #[tokio::test]
    async fn test_empty_subject_keeps_template_subject() {
        let generator = Arc::new(ScriptedGenerator::replying(None, "Generated body"));
        let composer = DraftComposer::new(&config(), Some(generator));
        let content = composer.compose(&template(true), &contact(), &site()).await;
        assert_eq!(content.subject, "About Lima Bakery");
        assert!(content.ai_assisted);
    }

    #[tokio::test]
    async fn test_failures_fall_back() {
        let failing = Arc::new(ScriptedGenerator {
            reply: Err("quota".to_string()),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        });
        let composer = DraftComposer::new(&config(), Some(failing));
        let content = composer.compose(&template(true), &contact(), &site()).await;
        assert_eq!(content.body, "Hi Ana, I looked at https://bakery.test/.");
        assert!(!content.ai_assisted);

        let empty = Arc::new(ScriptedGenerator::replying(Some("x"), "   "));
        let composer = DraftComposer::new(&config(), Some(empty));
        assert!(!composer.compose(&template(true), &contact(), &site()).await.ai_assisted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_generator_times_out() {
        let slow = Arc::new(ScriptedGenerator {
            delay: Duration::from_secs(60),
            ..ScriptedGenerator::replying(None, "late")
        });
        let composer = DraftComposer::new(&config(), Some(slow));
        let content = composer.compose(&template(true), &contact(), &site()).await;
        assert!(!content.ai_assisted);
    }

    #[tokio::test]
    async fn test_compose_draft_queues_pending() {
        let mut store = SqliteStorage::open_in_memory().unwrap();
        let site_id = store.insert_site("bakery.test", "https://bakery.test/").unwrap();
        let contact_id = store
            .insert_contact(
                site_id,
                &NewContact {
                    email: "ana@bakery.test".to_string(),
                    name: Some("Ana Lima".to_string()),
                    position: None,
                    source_type: SourceType::ContactPage,
                    source_url: None,
                    snippet: None,
                },
            )
            .unwrap()
            .unwrap();
        store
            .insert_template(&NewTemplate {
                name: "intro".to_string(),
                subject: "Hello {{domain}}".to_string(),
                body: "Hi {{first_name}}".to_string(),
                preheader: None,
                use_ai: false,
                ai_instructions: None,
            })
            .unwrap();
        let storage: SharedStorage = Arc::new(StdMutex::new(store));

        let composer = DraftComposer::new(&ComposeConfig::default(), None);
        let queue = ReviewQueue::new(ReviewConfig::default());

        let draft = compose_draft(&storage, &composer, &queue, contact_id, "intro", None)
            .await
            .unwrap();
        assert_eq!(draft.subject, "Hello bakery.test");
        assert_eq!(draft.body, "Hi Ana");
        assert_eq!(draft.priority, 60);

        let missing = compose_draft(&storage, &composer, &queue, contact_id, "nope", None).await;
        assert!(matches!(
            missing,
            Err(OutreachError::Compose(ComposeError::TemplateNotFound(_)))
        ));
    }
}
