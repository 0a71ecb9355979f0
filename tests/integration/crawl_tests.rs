//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small site and drive the real HTTP
//! fetcher through the orchestrator and the site lifecycle.

use outreach_pipeline::config::{CrawlerConfig, ExtractionConfig, UserAgentConfig};
use outreach_pipeline::crawler::{
    register_site, run_site_crawl, CrawlError, CrawlOrchestrator, HttpFetcher, SiteCrawler,
};
use outreach_pipeline::extract::Extractor;
use outreach_pipeline::storage::{SqliteStorage, Storage};
use outreach_pipeline::{OutreachError, SharedStorage, SiteStatus};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://agency.test/bot".to_string(),
        contact_email: "bot@agency.test".to_string(),
    }
}

fn orchestrator(max_pages: u32, max_depth: u32) -> CrawlOrchestrator {
    let config = CrawlerConfig {
        max_pages,
        max_depth,
        max_concurrent_fetches: 2,
        request_timeout_secs: 5,
        crawl_timeout_secs: 30,
        snapshot_chars: 10_000,
    };
    let fetcher = HttpFetcher::new(&user_agent(), &config).expect("Failed to build fetcher");
    CrawlOrchestrator::new(Arc::new(fetcher), config)
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_follows_in_scope_links_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r##"<html><body>
                <a href="/about">About</a>
                <a href="/contact#form">Contact</a>
                <a href="/about/">About again</a>
                <a href="https://elsewhere.test/page">Offsite</a>
                <a href="mailto:info@example.com">Mail</a>
                <a href="/brochure.pdf">Brochure</a>
            </body></html>"##,
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><a href="/">Home</a><a href="/team">Team</a></body></html>"#,
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;

    mount_html(&server, "/contact", "<html><body>Call us</body></html>").await;
    mount_html(&server, "/team", "<html><body>Our team</body></html>").await;

    Mock::given(method("GET"))
        .and(path("/brochure.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF", "application/pdf"))
        .mount(&server)
        .await;

    let root = url::Url::parse(&format!("{}/", server.uri())).unwrap();
    let output = orchestrator(10, 2).crawl_site(&root).await.unwrap();

    let paths: Vec<&str> = output.pages.iter().map(|p| p.url.path()).collect();
    assert_eq!(paths[0], "/");
    assert_eq!(output.page_count(), 4);
    assert!(paths.contains(&"/about"));
    assert!(paths.contains(&"/contact"));
    assert!(paths.contains(&"/team"));
    assert!(!paths.contains(&"/brochure.pdf"));
    assert!(!output.budget_exhausted);
}

#[tokio::test]
async fn test_depth_limit_stops_descent() {
    let server = MockServer::start().await;
    mount_html(&server, "/", r#"<a href="/one">One</a>"#).await;
    mount_html(&server, "/one", r#"<a href="/two">Two</a>"#).await;

    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("too deep", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let root = url::Url::parse(&format!("{}/", server.uri())).unwrap();
    let output = orchestrator(10, 1).crawl_site(&root).await.unwrap();
    assert_eq!(output.page_count(), 2);
}

#[tokio::test]
async fn test_failed_subpage_is_skipped() {
    let server = MockServer::start().await;
    mount_html(&server, "/", r#"<a href="/broken">Broken</a><a href="/ok">Ok</a>"#).await;
    mount_html(&server, "/ok", "fine").await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let root = url::Url::parse(&format!("{}/", server.uri())).unwrap();
    let output = orchestrator(3, 2).crawl_site(&root).await.unwrap();
    let paths: Vec<&str> = output.pages.iter().map(|p| p.url.path()).collect();
    assert_eq!(paths, vec!["/", "/ok"]);
}

#[tokio::test]
async fn test_site_crawl_extracts_contacts_once() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><head><title>Example Shop</title></head><body>
            <a href="mailto:info@example.com?subject=x">Contact Info</a>
            <p>Orders go to sales@example.com</p>
            <a href="/about">About</a>
        </body></html>"#,
    )
    .await;

    let mut store = SqliteStorage::open_in_memory().unwrap();
    let (site_id, _) = register_site(&mut store, &server.uri()).unwrap();
    let storage: SharedStorage = Arc::new(Mutex::new(store));
    let extractor = Extractor::new(&ExtractionConfig::default()).unwrap();
    let crawler = orchestrator(1, 2);

    let report = run_site_crawl(&storage, &crawler, &extractor, site_id, 10_000)
        .await
        .unwrap();
    assert_eq!(report.page_count, 1);
    assert_eq!(report.new_contact_ids.len(), 2);

    {
        let store = storage.lock().unwrap();
        let site = store.get_site(site_id).unwrap().unwrap();
        assert_eq!(site.status, SiteStatus::Completed);
        assert_eq!(site.title.as_deref(), Some("Example Shop"));

        let mut emails: Vec<String> = store
            .list_contacts_for_site(site_id)
            .unwrap()
            .into_iter()
            .map(|c| c.email)
            .collect();
        emails.sort();
        assert_eq!(emails, vec!["info@example.com", "sales@example.com"]);
    }

    let rerun = run_site_crawl(&storage, &crawler, &extractor, site_id, 10_000)
        .await
        .unwrap();
    assert!(rerun.new_contact_ids.is_empty());

    let site = storage.lock().unwrap().get_site(site_id).unwrap().unwrap();
    assert_eq!(site.attempts, 2);
}

#[tokio::test]
async fn test_root_failure_marks_site_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut store = SqliteStorage::open_in_memory().unwrap();
    let (site_id, _) = register_site(&mut store, &server.uri()).unwrap();
    let storage: SharedStorage = Arc::new(Mutex::new(store));
    let extractor = Extractor::new(&ExtractionConfig::default()).unwrap();

    let result = run_site_crawl(&storage, &orchestrator(5, 2), &extractor, site_id, 10_000).await;
    match result {
        Err(OutreachError::Crawl(e @ CrawlError::RootFetch { .. })) => assert!(e.is_retryable()),
        other => panic!("expected a root fetch failure, got {:?}", other.map(|r| r.page_count)),
    }

    let site = storage.lock().unwrap().get_site(site_id).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Failed);
    assert!(site.last_error.unwrap().contains("503"));
}
