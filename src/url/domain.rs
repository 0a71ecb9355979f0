use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use outreach_pipeline::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Removes a leading `www.` label
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// The registered domain of a site: its lowercase host without `www.`
pub fn site_domain(url: &Url) -> Option<String> {
    extract_domain(url).map(|host| strip_www(&host).to_string())
}

/// Two hosts belong to the same site if they match once `www.` is stripped
pub fn is_same_site(host: &str, other: &str) -> bool {
    strip_www(&host.to_lowercase()) == strip_www(&other.to_lowercase())
}

/// Extracts the lowercase domain part of an email address
///
/// # Returns
///
/// * `Some(String)` - Everything after the last `@`, lowercased
/// * `None` - If there is no `@` or nothing follows it
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.rsplit_once('@')?;
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_site_domain_strips_www() {
        let url = Url::parse("https://WWW.Example.com/about").unwrap();
        assert_eq!(site_domain(&url), Some("example.com".to_string()));

        let url = Url::parse("https://shop.example.com/").unwrap();
        assert_eq!(site_domain(&url), Some("shop.example.com".to_string()));
    }

    #[test]
    fn test_same_site() {
        assert!(is_same_site("example.com", "www.example.com"));
        assert!(is_same_site("WWW.example.com", "example.com"));
        assert!(!is_same_site("blog.example.com", "example.com"));
        assert!(!is_same_site("example.org", "example.com"));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("CEO@Spam.com"), Some("spam.com".to_string()));
        assert_eq!(email_domain("a@b@mail.example.org"), Some("mail.example.org".to_string()));
        assert_eq!(email_domain("nobody"), None);
        assert_eq!(email_domain("nobody@"), None);
    }
}
