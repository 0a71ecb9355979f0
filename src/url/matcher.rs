/// Checks if a candidate domain is `domain` itself or one of its subdomains
///
/// Both sides are compared case-insensitively. This is the matching rule for
/// domain suppression entries: an entry for `spam.com` covers `spam.com`,
/// `mail.spam.com` and `a.b.spam.com`, but not `notspam.com`.
///
/// # Examples
///
/// ```
/// use outreach_pipeline::url::matches_domain;
///
/// assert!(matches_domain("spam.com", "spam.com"));
/// assert!(matches_domain("spam.com", "mail.spam.com"));
/// assert!(!matches_domain("spam.com", "notspam.com"));
/// ```
pub fn matches_domain(domain: &str, candidate: &str) -> bool {
    if domain.is_empty() || candidate.is_empty() {
        return false;
    }

    let domain = domain.to_lowercase();
    let candidate = candidate.to_lowercase();
    candidate == domain || candidate.ends_with(&format!(".{}", domain))
}

/// Returns the domain followed by each of its parent domains
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com`,
/// `example.com`, `com`. Looking each suffix up exactly is equivalent to
/// running [`matches_domain`] against every stored entry.
pub fn domain_suffixes(domain: &str) -> Vec<String> {
    let domain = domain.trim_end_matches('.').to_lowercase();
    if domain.is_empty() {
        return Vec::new();
    }

    let mut suffixes = vec![domain.clone()];
    let mut rest = domain.as_str();
    while let Some((_, parent)) = rest.split_once('.') {
        if parent.is_empty() {
            break;
        }
        suffixes.push(parent.to_string());
        rest = parent;
    }
    suffixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_domain("example.com", "example.com"));
        assert!(matches_domain("blog.example.com", "blog.example.com"));
    }

    #[test]
    fn test_subdomain_match() {
        assert!(matches_domain("example.com", "blog.example.com"));
        assert!(matches_domain("example.com", "api.v2.example.com"));
    }

    #[test]
    fn test_parent_does_not_match_child_entry() {
        assert!(!matches_domain("blog.example.com", "example.com"));
    }

    #[test]
    fn test_no_partial_label_match() {
        assert!(!matches_domain("example.com", "myexample.com"));
        assert!(!matches_domain("example.com", "example.com.org"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_domain("Spam.COM", "ceo.spam.com"));
        assert!(matches_domain("spam.com", "SPAM.COM"));
    }

    #[test]
    fn test_empty_strings() {
        assert!(!matches_domain("", "example.com"));
        assert!(!matches_domain("example.com", ""));
    }

    #[test]
    fn test_domain_suffixes() {
        assert_eq!(
            domain_suffixes("A.b.Example.com"),
            vec!["a.b.example.com", "b.example.com", "example.com", "com"]
        );
        assert_eq!(domain_suffixes("localhost"), vec!["localhost"]);
        assert!(domain_suffixes("").is_empty());
    }

    #[test]
    fn test_suffixes_agree_with_matcher() {
        let candidate = "mail.eu.spam.com";
        for suffix in domain_suffixes(candidate) {
            assert!(matches_domain(&suffix, candidate));
        }
    }
}
