use url::Url;

/// Extracts the lowercase host from a URL, without port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tidemark::url::extract_host;
///
/// let url = Url::parse("https://Sub.Example.com:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether `candidate` belongs to the seed host
///
/// Without subdomains only an exact match counts. With subdomains the seed
/// host itself and any host ending in `.<seed_host>` match, at any nesting
/// level. Both arguments are expected in lowercase.
///
/// # Examples
///
/// ```
/// use tidemark::url::host_in_scope;
///
/// assert!(host_in_scope("example.com", "example.com", false));
/// assert!(!host_in_scope("example.com", "blog.example.com", false));
/// assert!(host_in_scope("example.com", "api.v2.example.com", true));
/// assert!(!host_in_scope("example.com", "notexample.com", true));
/// ```
pub fn host_in_scope(seed_host: &str, candidate: &str, allow_subdomains: bool) -> bool {
    if candidate == seed_host {
        return true;
    }

    allow_subdomains
        && candidate.len() > seed_host.len()
        && candidate.ends_with(seed_host)
        && candidate.as_bytes()[candidate.len() - seed_host.len() - 1] == b'.'
}
