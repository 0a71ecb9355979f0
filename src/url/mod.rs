//! URL handling module
//!
//! This module provides URL normalization for crawl scope, site and email
//! domain extraction, and the exact-or-subdomain matching used by domain
//! suppression.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{email_domain, extract_domain, is_same_site, site_domain, strip_www};
pub use matcher::{domain_suffixes, matches_domain};
pub use normalize::{normalize_in_scope, normalize_url};

use crate::UrlError;
use url::Url;

/// Parses a site root and returns its canonical URL and registered domain
///
/// # Arguments
///
/// * `input` - A URL, or a bare domain such as `example.com`
///
/// # Returns
///
/// * `Ok((Url, String))` - Canonical root URL and lowercase domain without `www.`
/// * `Err(UrlError)` - Input is not an HTTP(S) URL with a host
pub fn canonical_site(input: &str) -> Result<(Url, String), UrlError> {
    let trimmed = input.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = normalize_url(&with_scheme)?;
    let domain = site_domain(&url).ok_or(UrlError::MissingDomain)?;
    Ok((url, domain))
}
