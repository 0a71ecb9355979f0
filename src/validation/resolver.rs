//! Mail-domain DNS lookups

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    TokioAsyncResolver,
};

/// A lookup-layer failure (timeout, server failure); not "no records"
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct LookupFailure(pub String);

/// One MX record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailExchange {
    pub preference: u16,
    /// Exchanger host without the trailing dot
    pub host: String,
}

/// The DNS collaborator of the validation engine
#[async_trait]
pub trait MailDomainResolver: Send + Sync {
    /// MX records of a domain; empty when the domain has none
    async fn mail_exchangers(&self, domain: &str) -> Result<Vec<MailExchange>, LookupFailure>;

    /// True when the domain has an A or AAAA record
    async fn has_address_record(&self, domain: &str) -> Result<bool, LookupFailure>;
}

/// trust-dns backed resolver with an explicit per-lookup timeout
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsResolver {
    /// Uses the system resolver configuration, falling back to public defaults
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match trust_dns_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::debug!(error = %e, "No system resolver config, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }
}

fn is_no_records(e: &ResolveError) -> bool {
    matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

#[async_trait]
impl MailDomainResolver for DnsResolver {
    async fn mail_exchangers(&self, domain: &str) -> Result<Vec<MailExchange>, LookupFailure> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.mx_lookup(domain))
            .await
            .map_err(|_| LookupFailure(format!("MX lookup for {} timed out", domain)))?;

        match lookup {
            Ok(records) => Ok(records
                .iter()
                .map(|mx| MailExchange {
                    preference: mx.preference(),
                    host: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                })
                .collect()),
            Err(e) if is_no_records(&e) => Ok(Vec::new()),
            Err(e) => Err(LookupFailure(e.to_string())),
        }
    }

    async fn has_address_record(&self, domain: &str) -> Result<bool, LookupFailure> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.lookup_ip(domain))
            .await
            .map_err(|_| LookupFailure(format!("Address lookup for {} timed out", domain)))?;

        match lookup {
            Ok(ips) => Ok(ips.iter().next().is_some()),
            Err(e) if is_no_records(&e) => Ok(false),
            Err(e) => Err(LookupFailure(e.to_string())),
        }
    }
}
