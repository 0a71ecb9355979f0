//! End-to-end pipeline tests
//!
//! A wiremock site is crawled, qualified, validated against a fake DNS
//! resolver, drafted, reviewed and sent through a recording mailer on a
//! manual clock.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use outreach_pipeline::compose::{compose_draft, DraftComposer};
use outreach_pipeline::config::{
    ComposeConfig, CrawlerConfig, ExtractionConfig, ReviewConfig, RuleEntry, SenderEntry,
    SendingConfig, SuppressionConfig, UserAgentConfig, ValidationConfig,
};
use outreach_pipeline::crawler::{register_site, run_site_crawl, CrawlOrchestrator, HttpFetcher};
use outreach_pipeline::dispatch::{DispatchOutcome, Dispatcher, Mailer, OutgoingMessage, RefusalKind};
use outreach_pipeline::extract::Extractor;
use outreach_pipeline::output::load_statistics;
use outreach_pipeline::qualification::{qualify_site, seed_rules};
use outreach_pipeline::review::{DraftEdits, ReviewQueue};
use outreach_pipeline::schedule::{Clock, ManualClock};
use outreach_pipeline::sender::SenderRotation;
use outreach_pipeline::state::{SuppressionKind, SuppressionSource};
use outreach_pipeline::storage::{NewTemplate, SqliteStorage, Storage};
use outreach_pipeline::suppression::SuppressionEngine;
use outreach_pipeline::validation::{LookupFailure, MailDomainResolver, MailExchange, ValidationEngine};
use outreach_pipeline::{lock_storage, DraftState, SharedStorage, ValidationStatus};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Every domain has one MX except `nomail.test`, which has nothing at all
struct FakeResolver;

#[async_trait]
impl MailDomainResolver for FakeResolver {
    async fn mail_exchangers(&self, domain: &str) -> Result<Vec<MailExchange>, LookupFailure> {
        if domain == "nomail.test" {
            return Ok(Vec::new());
        }
        Ok(vec![MailExchange {
            preference: 10,
            host: format!("mx.{}", domain),
        }])
    }

    async fn has_address_record(&self, _domain: &str) -> Result<bool, LookupFailure> {
        Ok(false)
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: parking_lot::Mutex<Vec<OutgoingMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), String> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

fn ten_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()
}

struct Pipeline {
    storage: SharedStorage,
    site_id: i64,
    queue: ReviewQueue,
    suppression: Arc<SuppressionEngine>,
    mailer: Arc<RecordingMailer>,
    clock: Arc<ManualClock>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    fn contact_id(&self, email: &str) -> i64 {
        lock_storage(&self.storage)
            .unwrap()
            .list_contacts_for_site(self.site_id)
            .unwrap()
            .into_iter()
            .find(|c| c.email == email)
            .map(|c| c.id)
            .unwrap()
    }

    async fn approved_draft(&self, contact_id: i64) -> i64 {
        let composer = DraftComposer::new(&ComposeConfig::default(), None);
        let draft = compose_draft(&self.storage, &composer, &self.queue, contact_id, "intro", None)
            .await
            .unwrap();
        let mut store = lock_storage(&self.storage).unwrap();
        self.queue
            .approve(&mut *store, draft.id, Some("reviewer"), &DraftEdits::default(), self.clock.now())
            .unwrap();
        draft.id
    }
}

async fn crawl_qualify_validate() -> Pipeline {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Example Shop</title></head><body>
                <a href="mailto:info@example.com">Contact Info</a>
                <p>Wholesale: sales@example.com</p>
                <p>Old inbox: legacy@nomail.test</p>
                <a href="/about">About us</a>
            </body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><p>Family business since 1990</p></body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let sending = SendingConfig::default();
    let mut store = SqliteStorage::open_in_memory().unwrap();
    let (site_id, _) = register_site(&mut store, &server.uri()).unwrap();

    let mut criteria = serde_json::Map::new();
    criteria.insert("min_pages".to_string(), json!(2));
    seed_rules(
        &mut store,
        &[RuleEntry {
            name: "established".to_string(),
            criteria,
        }],
    )
    .unwrap();

    SenderRotation::new(&sending)
        .seed(
            &mut store,
            &[SenderEntry {
                name: "primary".to_string(),
                from_address: "me@agency.test".to_string(),
                daily_limit: 10,
                smtp_host: None,
                smtp_port: None,
                username: None,
            }],
        )
        .unwrap();

    store
        .insert_template(&NewTemplate {
            name: "intro".to_string(),
            subject: "A note for {{ site_title }}".to_string(),
            body: "Hi {{ first_name }}, I visited {{ url }}.".to_string(),
            preheader: None,
            use_ai: false,
            ai_instructions: None,
        })
        .unwrap();

    let storage: SharedStorage = Arc::new(Mutex::new(store));

    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://agency.test/bot".to_string(),
        contact_email: "bot@agency.test".to_string(),
    };
    let crawler_config = CrawlerConfig::default();
    let fetcher = HttpFetcher::new(&user_agent, &crawler_config).unwrap();
    let crawler = CrawlOrchestrator::new(Arc::new(fetcher), crawler_config);
    let extractor = Extractor::new(&ExtractionConfig::default()).unwrap();

    let crawl = run_site_crawl(&storage, &crawler, &extractor, site_id, 10_000)
        .await
        .unwrap();
    assert_eq!(crawl.page_count, 2);
    assert_eq!(crawl.new_contact_ids.len(), 3);

    let qualification = qualify_site(&storage, site_id).unwrap();
    assert!(qualification.qualified);
    assert_eq!(qualification.matched_rules(), vec!["established"]);

    let validation = ValidationEngine::new(Arc::new(FakeResolver), &ValidationConfig::default())
        .validate_pending(&storage)
        .await
        .unwrap();
    assert_eq!(validation.validated, 3);
    assert_eq!(validation.valid, 2);
    assert_eq!(validation.invalid, 1);

    let clock = Arc::new(ManualClock::new(ten_am()));
    let mailer = Arc::new(RecordingMailer::default());
    let suppression = Arc::new(SuppressionEngine::new(SuppressionConfig::default()));
    let dispatcher = Dispatcher::new(
        storage.clone(),
        mailer.clone(),
        suppression.clone(),
        &sending,
        ReviewConfig::default(),
        clock.clone(),
    )
    .unwrap();

    Pipeline {
        storage,
        site_id,
        queue: ReviewQueue::new(ReviewConfig::default()),
        suppression,
        mailer,
        clock,
        dispatcher,
    }
}

#[tokio::test]
async fn test_site_to_sent_email() {
    let pipeline = crawl_qualify_validate().await;
    let contact_id = pipeline.contact_id("info@example.com");
    let draft_id = pipeline.approved_draft(contact_id).await;

    let outcome = pipeline.dispatcher.send_draft(draft_id).await.unwrap();
    assert!(outcome.is_sent());

    let sent = pipeline.mailer.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "info@example.com");
    assert_eq!(sent[0].from, "me@agency.test");
    assert_eq!(sent[0].subject, "A note for Example Shop");

    let store = lock_storage(&pipeline.storage).unwrap();
    let draft = store.get_draft(draft_id).unwrap().unwrap();
    assert_eq!(draft.state, DraftState::Sent);

    let contact = store.get_contact(contact_id).unwrap().unwrap();
    assert_eq!(contact.contact_count, 1);
    assert!(store.get_site(pipeline.site_id).unwrap().unwrap().contacted);

    let stats = load_statistics(&*store).unwrap();
    assert_eq!(stats.sends_succeeded, 1);
    assert_eq!(stats.qualified_sites, 1);
    assert_eq!(stats.contacts_by_validation.get(&ValidationStatus::Valid), Some(&2));
}

#[tokio::test]
async fn test_recent_contact_is_not_emailed_again() {
    let pipeline = crawl_qualify_validate().await;
    let contact_id = pipeline.contact_id("info@example.com");

    let first = pipeline.approved_draft(contact_id).await;
    assert!(pipeline.dispatcher.send_draft(first).await.unwrap().is_sent());

    pipeline.clock.advance(chrono::Duration::days(1));
    let second = pipeline.approved_draft(contact_id).await;
    match pipeline.dispatcher.send_draft(second).await.unwrap() {
        DispatchOutcome::Refused { kind, reason } => {
            assert_eq!(kind, RefusalKind::Suppressed);
            assert!(reason.contains("Contact was emailed within the last 90 days"));
        }
        other => panic!("expected a refusal, got {:?}", other),
    }
    assert_eq!(pipeline.mailer.sent.lock().len(), 1);

    let draft = lock_storage(&pipeline.storage).unwrap().get_draft(second).unwrap().unwrap();
    assert_eq!(draft.state, DraftState::Approved);
}

#[tokio::test]
async fn test_invalid_and_blacklisted_contacts_are_refused() {
    let pipeline = crawl_qualify_validate().await;

    let legacy = pipeline.contact_id("legacy@nomail.test");
    let legacy_draft = pipeline.approved_draft(legacy).await;
    match pipeline.dispatcher.send_draft(legacy_draft).await.unwrap() {
        DispatchOutcome::Refused { kind, .. } => assert_eq!(kind, RefusalKind::NotValidated),
        other => panic!("expected a refusal, got {:?}", other),
    }

    {
        let mut store = lock_storage(&pipeline.storage).unwrap();
        pipeline
            .suppression
            .add(
                &mut *store,
                SuppressionKind::Email,
                "Sales@Example.com",
                Some("asked to be removed"),
                SuppressionSource::Manual,
            )
            .unwrap();
    }

    let sales = pipeline.contact_id("sales@example.com");
    let sales_draft = pipeline.approved_draft(sales).await;
    match pipeline.dispatcher.send_draft(sales_draft).await.unwrap() {
        DispatchOutcome::Refused { kind, reason } => {
            assert_eq!(kind, RefusalKind::Suppressed);
            assert!(reason.contains("is blacklisted (asked to be removed)"));
        }
        other => panic!("expected a refusal, got {:?}", other),
    }
    assert!(pipeline.mailer.sent.lock().is_empty());
}

#[tokio::test]
async fn test_closed_window_defers_batch() {
    let pipeline = crawl_qualify_validate().await;
    let contact_id = pipeline.contact_id("info@example.com");
    pipeline.approved_draft(contact_id).await;

    pipeline
        .clock
        .set(Utc.with_ymd_and_hms(2024, 3, 5, 18, 30, 0).unwrap());
    let report = pipeline.dispatcher.send_approved_batch(None).await.unwrap();
    assert!(report.window_closed);
    assert_eq!(report.sent, 0);
    assert!(report.refused[0].1.contains("2024-03-06 08:00"));
}
