//! Integration tests for the chat-completions text generator

use outreach_pipeline::compose::{ComposeError, GenerationRequest, OpenAiGenerator, TextGenerator};
use outreach_pipeline::config::AiConfig;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generator(server: &MockServer, timeout: Duration) -> OpenAiGenerator {
    let config = AiConfig {
        base_url: format!("{}/v1/", server.uri()),
        model: "test-model".to_string(),
        api_key_env: "OPENAI_API_KEY".to_string(),
    };
    OpenAiGenerator::new(&config, " sk-test \n".to_string(), timeout).unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest {
        instructions: "Mention their product range".to_string(),
        excerpt: "We sell handmade furniture".to_string(),
        url: "https://example.com/".to_string(),
        site_title: Some("Example Furniture".to_string()),
        static_subject: "Hello".to_string(),
        static_body: "Hi there".to_string(),
        ..GenerationRequest::default()
    }
}

#[tokio::test]
async fn test_generation_parses_subject_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Subject: Your furniture site\n\nHi, I loved the oak tables."
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generated = generator(&server, Duration::from_secs(5))
        .generate(&request())
        .await
        .unwrap();
    assert_eq!(generated.subject.as_deref(), Some("Your furniture site"));
    assert_eq!(generated.body, "Hi, I loved the oak tables.");
}

#[tokio::test]
async fn test_http_error_becomes_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = generator(&server, Duration::from_secs(5))
        .generate(&request())
        .await
        .unwrap_err();
    match err {
        ComposeError::Generation(message) => {
            assert!(message.contains("429"));
            assert!(message.contains("rate limited"));
        }
        other => panic!("expected a generation error, got {}", other),
    }
}

#[tokio::test]
async fn test_slow_provider_hits_client_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "choices": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = generator(&server, Duration::from_millis(200))
        .generate(&request())
        .await
        .unwrap_err();
    match err {
        ComposeError::Http(e) => assert!(e.is_timeout()),
        other => panic!("expected an HTTP timeout, got {}", other),
    }
}
