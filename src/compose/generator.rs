//! AI text generation for drafts

use super::ComposeError;
use crate::config::AiConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything a generator may use to write one email
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub instructions: String,
    /// Site text, already truncated
    pub excerpt: String,
    pub url: String,
    pub site_title: Option<String>,
    pub platform: Option<String>,
    pub recipient_name: Option<String>,
    pub static_subject: String,
    pub static_body: String,
}

/// Generated text; an absent or empty subject keeps the template subject
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedText {
    pub subject: Option<String>,
    pub body: String,
}

/// The AI text-generation collaborator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, ComposeError>;
}

const SYSTEM_PROMPT: &str = "You write short, personal B2B cold emails. \
Use only facts present in the provided website content. \
Reply with a first line of the form 'Subject: <subject>', a blank line, then the email body.";

/// Splits a `Subject:` first line from the body
pub fn parse_generated(text: &str) -> GeneratedText {
    let text = text.trim();
    let (first, rest) = match text.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest),
        None => (text, ""),
    };

    match first
        .strip_prefix("Subject:")
        .or_else(|| first.strip_prefix("subject:"))
    {
        Some(subject) => GeneratedText {
            subject: Some(subject.trim().to_string()).filter(|s| !s.is_empty()),
            body: rest.trim().to_string(),
        },
        None => GeneratedText {
            subject: None,
            body: text.to_string(),
        },
    }
}

fn user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Instructions: {}\n", request.instructions));
    prompt.push_str(&format!("Website: {}\n", request.url));
    if let Some(title) = &request.site_title {
        prompt.push_str(&format!("Site title: {}\n", title));
    }
    if let Some(platform) = &request.platform {
        prompt.push_str(&format!("Platform: {}\n", platform));
    }
    if let Some(name) = &request.recipient_name {
        prompt.push_str(&format!("Recipient: {}\n", name));
    }
    prompt.push_str(&format!(
        "\nTemplate subject: {}\nTemplate body:\n{}\n",
        request.static_subject, request.static_body
    ));
    prompt.push_str(&format!("\nWebsite content:\n{}\n", request.excerpt));
    prompt
}

/// OpenAI-compatible chat-completions generator
pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(config: &AiConfig, api_key: String, timeout: Duration) -> Result<Self, ComposeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Reads the API key from the configured environment variable
    pub fn from_env(config: &AiConfig, timeout: Duration) -> Result<Self, ComposeError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ComposeError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key, timeout)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, ComposeError> {
        let prompt = user_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.7,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ComposeError::Generation(format!("HTTP {}: {}", status, text)));
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(parse_generated(&content))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subject_line() {
        let parsed = parse_generated("Subject: Your bakery site\n\nHi Ana,\nLoved the menu.");
        assert_eq!(parsed.subject.as_deref(), Some("Your bakery site"));
        assert_eq!(parsed.body, "Hi Ana,\nLoved the menu.");
    }

    #[test]
    fn test_parse_body_only() {
        let parsed = parse_generated("  Hi there, quick note.  ");
        assert_eq!(parsed.subject, None);
        assert_eq!(parsed.body, "Hi there, quick note.");
    }

    #[test]
    fn test_prompt_carries_context() {
        let prompt = user_prompt(&GenerationRequest {
            instructions: "Mention their platform".to_string(),
            excerpt: "Fresh bread daily".to_string(),
            url: "https://bakery.test/".to_string(),
            platform: Some("WordPress".to_string()),
            ..GenerationRequest::default()
        });
        assert!(prompt.contains("Platform: WordPress"));
        assert!(prompt.contains("Fresh bread daily"));
        assert!(!prompt.contains("Recipient:"));
    }
}
