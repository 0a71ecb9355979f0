//! Outreach pipeline main entry point
//!
//! This is the command-line interface for crawling, qualifying, reviewing
//! and sending outreach email.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use outreach_pipeline::compose::{compose_draft, DraftComposer, OpenAiGenerator, TextGenerator};
use outreach_pipeline::config::{load_config_with_hash, Config};
use outreach_pipeline::crawler::{
    build_http_client, crawl_sites, register_site, CrawlOrchestrator, HostedCrawlClient,
    HttpFetcher, SiteCrawler,
};
use outreach_pipeline::dispatch::{Dispatcher, DispatchOutcome, DryRunMailer};
use outreach_pipeline::extract::Extractor;
use outreach_pipeline::output::{format_site_report, load_statistics, print_statistics, write_site_report};
use outreach_pipeline::qualification::{evaluate_site, load_rules, qualify_completed_sites, qualify_site, seed_rules};
use outreach_pipeline::review::{DraftEdits, ReviewQueue};
use outreach_pipeline::schedule::SystemClock;
use outreach_pipeline::sender::SenderRotation;
use outreach_pipeline::state::{SuppressionKind, SuppressionSource};
use outreach_pipeline::storage::{NewTemplate, SqliteStorage, Storage};
use outreach_pipeline::suppression::SuppressionEngine;
use outreach_pipeline::validation::{DnsResolver, ValidationEngine};
use outreach_pipeline::{lock_storage, DraftState, SharedStorage, SiteStatus};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Outreach pipeline: crawl, qualify and contact websites safely
#[derive(Parser, Debug)]
#[command(name = "outreach-pipeline")]
#[command(version = "1.0.0")]
#[command(about = "Policy-compliant B2B outreach pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "outreach.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and register configured rules and sender accounts
    Init,
    /// Manage sites
    #[command(subcommand)]
    Site(SiteCommand),
    /// Crawl sites and extract contacts
    Crawl {
        /// Sites to crawl (default: every pending site)
        #[arg(long = "site")]
        sites: Vec<i64>,
        /// Also retry sites whose last crawl failed
        #[arg(long)]
        retry_failed: bool,
        /// Use the hosted crawl service instead of the in-process crawler
        #[arg(long)]
        hosted: bool,
    },
    /// Evaluate qualification rules against crawled sites
    Qualify {
        #[arg(long)]
        site: Option<i64>,
    },
    /// Validate every unvalidated contact
    Validate,
    /// Manage the suppression list
    #[command(subcommand)]
    Suppress(SuppressCommand),
    /// Manage email templates
    #[command(subcommand)]
    Template(TemplateCommand),
    /// Create review drafts
    #[command(subcommand)]
    Draft(DraftCommand),
    /// Work the review queue
    #[command(subcommand)]
    Review(ReviewCommand),
    /// Send approved drafts (dry-run transport)
    Send {
        /// Send a single draft
        #[arg(long)]
        draft: Option<i64>,
        /// Maximum drafts in a batch
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Manage sender accounts
    #[command(subcommand)]
    Sender(SenderCommand),
    /// Purge old terminal drafts
    Cleanup,
    /// Show pipeline statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum SiteCommand {
    /// Register a site by URL or domain
    Add { url: String },
    /// List sites
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Print a markdown report for one site
    Show {
        id: i64,
        /// Write the report to this file instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SuppressValue {
    /// Email address or domain
    value: String,
    /// Treat the value as a domain even without inference
    #[arg(long)]
    domain: bool,
}

impl SuppressValue {
    fn kind(&self) -> SuppressionKind {
        if self.domain {
            SuppressionKind::Domain
        } else {
            SuppressionKind::infer(&self.value)
        }
    }
}

#[derive(Subcommand, Debug)]
enum SuppressCommand {
    Add {
        #[command(flatten)]
        target: SuppressValue,
        #[arg(long)]
        reason: Option<String>,
    },
    Remove {
        #[command(flatten)]
        target: SuppressValue,
    },
    Activate {
        #[command(flatten)]
        target: SuppressValue,
    },
    Deactivate {
        #[command(flatten)]
        target: SuppressValue,
    },
    List {
        /// Include inactive entries
        #[arg(long)]
        all: bool,
    },
    /// Import `value,reason,source` rows
    Import { file: PathBuf },
    /// Export `value,reason,source` rows to stdout or a file
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    Add {
        name: String,
        #[arg(long)]
        subject: String,
        /// File containing the body
        #[arg(long)]
        body_file: PathBuf,
        #[arg(long)]
        preheader: Option<String>,
        /// AI instructions; enables generation for this template
        #[arg(long)]
        ai_instructions: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum DraftCommand {
    /// Compose a draft for a contact and queue it for review
    Create {
        #[arg(long)]
        contact: i64,
        #[arg(long)]
        template: String,
        /// Force review at this priority
        #[arg(long)]
        priority: Option<u8>,
    },
}

#[derive(Subcommand, Debug)]
enum ReviewCommand {
    List {
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Approve {
        id: i64,
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body_file: Option<PathBuf>,
        #[arg(long)]
        preheader: Option<String>,
    },
    Reject {
        id: i64,
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    Requeue { id: i64 },
    BulkApprove {
        ids: Vec<i64>,
        #[arg(long)]
        reviewer: Option<String>,
    },
    BulkReject {
        ids: Vec<i64>,
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SenderCommand {
    /// Register configured sender accounts that are not stored yet
    Add,
    List,
    /// Disable unhealthy accounts
    Sweep,
    /// Zero every account's daily counter
    ResetDaily,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    tracing::debug!(config = %cli.config.display(), hash = %config_hash, "Configuration loaded");

    let storage = open_storage(&config)?;

    match cli.command {
        Command::Init => handle_init(&config, &storage),
        Command::Site(cmd) => handle_site(cmd, &storage),
        Command::Crawl {
            sites,
            retry_failed,
            hosted,
        } => handle_crawl(&config, &storage, sites, retry_failed, hosted).await,
        Command::Qualify { site } => handle_qualify(&storage, site),
        Command::Validate => handle_validate(&config, &storage).await,
        Command::Suppress(cmd) => handle_suppress(&config, &storage, cmd),
        Command::Template(cmd) => handle_template(&storage, cmd),
        Command::Draft(cmd) => handle_draft(&config, &storage, cmd).await,
        Command::Review(cmd) => handle_review(&config, &storage, cmd),
        Command::Send { draft, limit } => handle_send(&config, &storage, draft, limit).await,
        Command::Sender(cmd) => handle_sender(&config, &storage, cmd),
        Command::Cleanup => {
            let queue = ReviewQueue::new(config.review.clone());
            let deleted = queue.cleanup(&mut *lock_storage(&storage)?, chrono::Utc::now())?;
            println!("Deleted {} old drafts", deleted);
            Ok(())
        }
        Command::Stats => {
            let stats = load_statistics(&*lock_storage(&storage)?)?;
            print_statistics(&stats);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("outreach_pipeline=info,warn"),
            1 => EnvFilter::new("outreach_pipeline=debug,info"),
            2 => EnvFilter::new("outreach_pipeline=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_storage(config: &Config) -> Result<SharedStorage> {
    let path = PathBuf::from(&config.database.path);
    let store = SqliteStorage::new(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(Arc::new(Mutex::new(store)))
}

fn handle_init(config: &Config, storage: &SharedStorage) -> Result<()> {
    let mut store = lock_storage(storage)?;
    let rules = seed_rules(&mut *store, &config.rules)?;
    let senders = SenderRotation::new(&config.sending).seed(&mut *store, &config.senders)?;
    println!(
        "Database ready at {} ({} rules, {} new sender accounts)",
        config.database.path, rules, senders
    );
    Ok(())
}

fn handle_site(cmd: SiteCommand, storage: &SharedStorage) -> Result<()> {
    let mut store = lock_storage(storage)?;
    match cmd {
        SiteCommand::Add { url } => {
            let (id, domain) = register_site(&mut *store, &url)?;
            println!("{}\t{}", id, domain);
        }
        SiteCommand::List { status } => {
            let status = match status {
                Some(s) => Some(
                    SiteStatus::from_db_string(&s).with_context(|| format!("unknown site status '{}'", s))?,
                ),
                None => None,
            };
            for site in store.list_sites(status)? {
                println!(
                    "{}\t{}\t{}\tpages={}\tqualified={}\tcontacted={}",
                    site.id,
                    site.domain,
                    site.status,
                    site.page_count.unwrap_or(0),
                    site.qualified,
                    site.contacted
                );
            }
        }
        SiteCommand::Show { id, report: report_path } => {
            let site = store.get_site(id)?.with_context(|| format!("site {} not found", id))?;
            let contacts = store.list_contacts_for_site(id)?;
            let report = if site.status == SiteStatus::Completed {
                Some(evaluate_site(&site, &load_rules(&*store)?))
            } else {
                None
            };
            match report_path {
                Some(path) => {
                    write_site_report(&site, &contacts, report.as_ref(), &path)?;
                    tracing::info!(site_id = id, path = %path.display(), "Site report written");
                }
                None => print!("{}", format_site_report(&site, &contacts, report.as_ref())),
            }
        }
    }
    Ok(())
}

async fn handle_crawl(
    config: &Config,
    storage: &SharedStorage,
    sites: Vec<i64>,
    retry_failed: bool,
    hosted: bool,
) -> Result<()> {
    let site_ids = if sites.is_empty() {
        let store = lock_storage(storage)?;
        let mut ids: Vec<i64> = store
            .list_sites(Some(SiteStatus::Pending))?
            .into_iter()
            .map(|s| s.id)
            .collect();
        if retry_failed {
            ids.extend(store.list_sites(Some(SiteStatus::Failed))?.into_iter().map(|s| s.id));
        }
        ids
    } else {
        sites
    };

    let crawler: Box<dyn SiteCrawler> = if hosted {
        let Some(hosted) = &config.hosted_crawler else {
            bail!("--hosted requires a [hosted-crawler] section");
        };
        let token = std::env::var(&hosted.api_key_env)
            .with_context(|| format!("environment variable {} is not set", hosted.api_key_env))?;
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        Box::new(HostedCrawlClient::new(client, hosted, &config.crawler, token))
    } else {
        let fetcher = HttpFetcher::new(&config.user_agent, &config.crawler)?;
        Box::new(CrawlOrchestrator::new(Arc::new(fetcher), config.crawler.clone()))
    };

    let extractor = Extractor::new(&config.extraction)?;
    let report = crawl_sites(
        storage,
        crawler.as_ref(),
        &extractor,
        &site_ids,
        config.crawler.snapshot_chars,
    )
    .await?;

    println!(
        "Crawled {} sites ({} failed), {} new contacts",
        report.crawled, report.failed, report.new_contacts
    );
    Ok(())
}

fn handle_qualify(storage: &SharedStorage, site: Option<i64>) -> Result<()> {
    let reports = match site {
        Some(id) => vec![qualify_site(storage, id)?],
        None => qualify_completed_sites(storage)?,
    };
    for report in &reports {
        let matched = report.matched_rules();
        println!(
            "{}\t{}\t{}",
            report.site_id,
            if report.qualified { "qualified" } else { "not qualified" },
            matched.join(",")
        );
    }
    Ok(())
}

async fn handle_validate(config: &Config, storage: &SharedStorage) -> Result<()> {
    let resolver = DnsResolver::new(Duration::from_secs(config.validation.dns_timeout_secs));
    let engine = ValidationEngine::new(Arc::new(resolver), &config.validation);
    let report = engine.validate_pending(storage).await?;
    println!(
        "Validated {} contacts: {} valid, {} invalid",
        report.validated, report.valid, report.invalid
    );
    Ok(())
}

fn handle_suppress(config: &Config, storage: &SharedStorage, cmd: SuppressCommand) -> Result<()> {
    let engine = SuppressionEngine::new(config.suppression.clone());
    let mut store = lock_storage(storage)?;

    match cmd {
        SuppressCommand::Add { target, reason } => {
            engine.add(
                &mut *store,
                target.kind(),
                &target.value,
                reason.as_deref(),
                SuppressionSource::Manual,
            )?;
            println!("Suppressed {} {}", target.kind(), target.value);
        }
        SuppressCommand::Remove { target } => {
            if !engine.remove(&mut *store, target.kind(), &target.value)? {
                bail!("no suppression entry for {}", target.value);
            }
        }
        SuppressCommand::Activate { target } => {
            if !engine.set_active(&mut *store, target.kind(), &target.value, true)? {
                bail!("no suppression entry for {}", target.value);
            }
        }
        SuppressCommand::Deactivate { target } => {
            if !engine.set_active(&mut *store, target.kind(), &target.value, false)? {
                bail!("no suppression entry for {}", target.value);
            }
        }
        SuppressCommand::List { all } => {
            for entry in store.list_suppressions(!all)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.kind,
                    entry.value,
                    entry.source,
                    if entry.active { "active" } else { "inactive" },
                    entry.reason.unwrap_or_default()
                );
            }
        }
        SuppressCommand::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = engine.import(&mut *store, &text)?;
            println!("Imported {} emails and {} domains", report.emails, report.domains);
        }
        SuppressCommand::Export { output, all } => {
            let text = engine.export(&*store, !all)?;
            match output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", text),
            }
        }
    }
    Ok(())
}

fn handle_template(storage: &SharedStorage, cmd: TemplateCommand) -> Result<()> {
    match cmd {
        TemplateCommand::Add {
            name,
            subject,
            body_file,
            preheader,
            ai_instructions,
        } => {
            let body = std::fs::read_to_string(&body_file)
                .with_context(|| format!("failed to read {}", body_file.display()))?;
            let id = lock_storage(storage)?.insert_template(&NewTemplate {
                name,
                subject,
                body,
                preheader,
                use_ai: ai_instructions.is_some(),
                ai_instructions,
            })?;
            println!("Template {} stored", id);
        }
    }
    Ok(())
}

fn build_generator(config: &Config) -> Option<Arc<dyn TextGenerator>> {
    let ai = config.ai.as_ref()?;
    let timeout = Duration::from_secs(config.compose.generation_timeout_secs);
    match OpenAiGenerator::from_env(ai, timeout) {
        Ok(generator) => Some(Arc::new(generator)),
        Err(e) => {
            tracing::warn!(error = %e, "AI generation disabled");
            None
        }
    }
}

async fn handle_draft(config: &Config, storage: &SharedStorage, cmd: DraftCommand) -> Result<()> {
    match cmd {
        DraftCommand::Create {
            contact,
            template,
            priority,
        } => {
            let composer = DraftComposer::new(&config.compose, build_generator(config));
            let queue = ReviewQueue::new(config.review.clone());
            let draft = compose_draft(storage, &composer, &queue, contact, &template, priority).await?;
            println!(
                "Draft {} queued (priority {}{})",
                draft.id,
                draft.priority,
                if draft.ai_assisted { ", AI-assisted" } else { "" }
            );
        }
    }
    Ok(())
}

fn print_bulk(outcomes: &[outreach_pipeline::review::BulkOutcome]) {
    for outcome in outcomes {
        match &outcome.error {
            None => println!("{}\tok", outcome.draft_id),
            Some(error) => println!("{}\terror: {}", outcome.draft_id, error),
        }
    }
}

fn handle_review(config: &Config, storage: &SharedStorage, cmd: ReviewCommand) -> Result<()> {
    let queue = ReviewQueue::new(config.review.clone());
    let mut store = lock_storage(storage)?;
    let now = chrono::Utc::now();

    match cmd {
        ReviewCommand::List { state, limit } => {
            let state = match state {
                Some(s) => Some(DraftState::from_db_string(&s).with_context(|| format!("unknown draft state '{}'", s))?),
                None => None,
            };
            for draft in queue.list(&*store, state, limit)? {
                println!(
                    "{}\t{}\tp={}\tcontact={}\t{}\t{}",
                    draft.id,
                    draft.state,
                    draft.priority,
                    draft.contact_id,
                    draft.subject,
                    draft.notes.unwrap_or_default()
                );
            }
        }
        ReviewCommand::Approve {
            id,
            reviewer,
            subject,
            body_file,
            preheader,
        } => {
            let body = match body_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?,
                ),
                None => None,
            };
            let edits = DraftEdits {
                subject,
                body,
                preheader,
            };
            queue.approve(&mut *store, id, reviewer.as_deref(), &edits, now)?;
            println!("Draft {} approved", id);
        }
        ReviewCommand::Reject { id, reviewer, reason } => {
            queue.reject(&mut *store, id, reviewer.as_deref(), reason.as_deref(), now)?;
            println!("Draft {} rejected", id);
        }
        ReviewCommand::Requeue { id } => {
            queue.requeue(&mut *store, id)?;
            println!("Draft {} requeued", id);
        }
        ReviewCommand::BulkApprove { ids, reviewer } => {
            print_bulk(&queue.bulk_approve(&mut *store, &ids, reviewer.as_deref(), now));
        }
        ReviewCommand::BulkReject { ids, reviewer, reason } => {
            print_bulk(&queue.bulk_reject(&mut *store, &ids, reviewer.as_deref(), reason.as_deref(), now));
        }
    }
    Ok(())
}

async fn handle_send(
    config: &Config,
    storage: &SharedStorage,
    draft: Option<i64>,
    limit: Option<usize>,
) -> Result<()> {
    let dispatcher = Dispatcher::new(
        storage.clone(),
        Arc::new(DryRunMailer),
        Arc::new(SuppressionEngine::new(config.suppression.clone())),
        &config.sending,
        config.review.clone(),
        Arc::new(SystemClock),
    )?;

    match draft {
        Some(id) => match dispatcher.send_draft(id).await? {
            DispatchOutcome::Sent { sender_id, .. } => println!("Draft {} sent via sender {}", id, sender_id),
            DispatchOutcome::Failed { error, .. } => println!("Draft {} failed: {}", id, error),
            DispatchOutcome::Refused { reason, .. } => println!("Draft {} not sent: {}", id, reason),
        },
        None => {
            let report = dispatcher.send_approved_batch(limit).await?;
            println!(
                "Sent {}, failed {}, refused {}{}",
                report.sent,
                report.failed,
                report.refused.len(),
                if report.window_closed { " (window closed)" } else { "" }
            );
            for (id, reason) in &report.refused {
                println!("  {}\t{}", id, reason);
            }
        }
    }
    Ok(())
}

fn handle_sender(config: &Config, storage: &SharedStorage, cmd: SenderCommand) -> Result<()> {
    let rotation = SenderRotation::new(&config.sending);
    let mut store = lock_storage(storage)?;

    match cmd {
        SenderCommand::Add => {
            let added = rotation.seed(&mut *store, &config.senders)?;
            println!("Registered {} sender accounts", added);
        }
        SenderCommand::List => {
            for account in store.list_senders()? {
                let health = rotation.health(&account);
                println!(
                    "{}\t{}\t{}\t{}/{}\t{}\t{}",
                    account.id,
                    account.name,
                    account.from_address,
                    account.sent_today,
                    account.daily_limit,
                    if account.active { "active" } else { "disabled" },
                    health
                        .success_rate
                        .map(|r| format!("{:.1}%", r * 100.0))
                        .unwrap_or_else(|| "n/a".to_string())
                );
            }
        }
        SenderCommand::Sweep => {
            let disabled = rotation.sweep(&mut *store)?;
            for sender in &disabled {
                println!("Disabled {}: {}", sender.name, sender.reason);
            }
            if disabled.is_empty() {
                println!("All active sender accounts are healthy");
            }
        }
        SenderCommand::ResetDaily => {
            let reset = rotation.reset_daily(&mut *store)?;
            println!("Reset {} accounts", reset);
        }
    }
    Ok(())
}
