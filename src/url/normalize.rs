use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Normalizes a URL into its canonical form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Normalize path:
///    - Remove dot segments (. and ..) and repeated slashes
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters
/// 6. Sort remaining query parameters alphabetically
/// 7. Remove empty query string (trailing ?)
///
/// The scheme and any `www.` label are kept; crawl scope decides how to
/// treat those (see [`normalize_in_scope`]).
///
/// # Examples
///
/// ```
/// use outreach_pipeline::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.COM/team/#jobs").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/team");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Normalizes an already-resolved link onto the crawl root's scheme and host
///
/// Every page of one crawl shares the root URL's scheme and host, so
/// `http://site/a`, `https://site/a` and `https://www.site/a` are a single
/// visited entry. Callers decide beforehand whether the link is on the same
/// site at all.
pub fn normalize_in_scope(url: &Url, root: &Url) -> Result<Url, UrlError> {
    let mut url = normalize_parsed(url.clone())?;
    if url.scheme() != root.scheme() {
        url.set_scheme(root.scheme())
            .map_err(|_| UrlError::InvalidScheme(root.scheme().to_string()))?;
    }
    let root_host = root.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    if url.host_str() != Some(root_host.as_str()) {
        url.set_host(Some(&root_host))
            .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
    }
    Ok(url)
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let normalized_host = host.to_lowercase();
        url.set_host(Some(&normalized_host))
            .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
    } else {
        return Err(UrlError::MissingDomain);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = filtered_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Resolves dot segments, collapses repeated slashes and drops a trailing
/// slash everywhere but the root
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Query pairs without tracking parameters, ordered by key
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
