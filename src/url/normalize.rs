use crate::config::CrawlConfig;
use crate::UrlError;
use url::Url;

/// Normalizes a URL into the form used as its dedup key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or hostless
/// 2. Lowercase the host (the `url` crate already does this for http(s))
/// 3. Remove the fragment unless `allow_hash_in_url`
/// 4. Remove the query unless `allow_query_in_url`; otherwise drop an empty
///    query and sort the remaining parameters so equivalent URLs collapse
///
/// # Examples
///
/// ```
/// use tidemark::config::{CrawlConfig, CrawlOptions};
/// use tidemark::url::normalize_for_crawl;
///
/// let config = CrawlConfig::new(&CrawlOptions::with_seed("http://example.com/")).unwrap();
/// let url = normalize_for_crawl("http://EXAMPLE.com/page?id=4#top", &config).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
/// ```
pub fn normalize_for_crawl(url_str: &str, config: &CrawlConfig) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url, config)
}

/// Same as [`normalize_for_crawl`] for an already parsed URL
pub fn normalize_parsed(mut url: Url, config: &CrawlConfig) -> Result<Url, UrlError> {
    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    if url.host_str() != Some(host.as_str()) {
        url.set_host(Some(&host))
            .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
    }

    if !config.allow_hash_in_url {
        url.set_fragment(None);
    }

    if !config.allow_query_in_url {
        url.set_query(None);
    } else if url.query().is_some() {
        let params = sorted_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Query parameters sorted by key, keeping the relative order of equal keys
fn sorted_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.is_empty())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}
