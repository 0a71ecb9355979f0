//! Integration tests for the hosted crawl client

use outreach_pipeline::config::{CrawlerConfig, HostedCrawlerConfig};
use outreach_pipeline::crawler::{CrawlError, HostedCrawlClient, SiteCrawler};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, max_polls: u32, max_pages: u32) -> HostedCrawlClient {
    let hosted = HostedCrawlerConfig {
        base_url: format!("{}/", server.uri()),
        api_key_env: "HOSTED_CRAWLER_TOKEN".to_string(),
        poll_interval_secs: 0,
        max_polls,
    };
    let crawler = CrawlerConfig {
        max_pages,
        max_depth: 2,
        ..CrawlerConfig::default()
    };
    HostedCrawlClient::new(reqwest::Client::new(), &hosted, &crawler, "secret".to_string())
}

fn job(status: &str) -> serde_json::Value {
    json!({ "data": { "id": "job-1", "status": status } })
}

async fn mount_start(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/crawls"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({ "startUrl": "https://example.com/", "maxDepth": 2 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(job("running")))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_hosted_crawl_submits_polls_and_fetches_pages() {
    let server = MockServer::start().await;
    mount_start(&server).await;

    Mock::given(method("GET"))
        .and(path("/crawls/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("RUNNING")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crawls/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("SUCCEEDED")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/crawls/job-1/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "url": "https://example.com/", "html": "<p>home</p>" },
            { "url": "not a url", "html": "<p>dropped</p>" },
            { "url": "https://example.com/about", "html": "<p>about</p>" },
            { "url": "https://example.com/extra", "html": "<p>over the limit</p>" }
        ])))
        .mount(&server)
        .await;

    let root = url::Url::parse("https://example.com/").unwrap();
    let output = client(&server, 5, 3).crawl_site(&root).await.unwrap();

    let urls: Vec<&str> = output.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/", "https://example.com/about"]);
    assert!(output.corpus().contains("<p>about</p>"));
}

#[tokio::test]
async fn test_hosted_job_failure_is_reported() {
    let server = MockServer::start().await;
    mount_start(&server).await;

    Mock::given(method("GET"))
        .and(path("/crawls/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("FAILED")))
        .mount(&server)
        .await;

    let root = url::Url::parse("https://example.com/").unwrap();
    let err = client(&server, 5, 10).crawl_site(&root).await.unwrap_err();
    match err {
        CrawlError::Hosted(message) => assert!(message.contains("FAILED")),
        other => panic!("expected a hosted failure, got {}", other),
    }
}

#[tokio::test]
async fn test_hosted_poll_budget_times_out() {
    let server = MockServer::start().await;
    mount_start(&server).await;

    Mock::given(method("GET"))
        .and(path("/crawls/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("RUNNING")))
        .expect(2)
        .mount(&server)
        .await;

    let root = url::Url::parse("https://example.com/").unwrap();
    let err = client(&server, 2, 10).crawl_site(&root).await.unwrap_err();
    assert!(matches!(err, CrawlError::Timeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_hosted_http_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crawls"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&server)
        .await;

    let root = url::Url::parse("https://example.com/").unwrap();
    let err = client(&server, 2, 10).crawl_site(&root).await.unwrap_err();
    assert_eq!(err.to_string(), "Hosted crawl failed: HTTP 401: bad token");
}
