//! Link eligibility filter
//!
//! The filter is a pure predicate over a URL, its crawl depth and the run's
//! [`CrawlConfig`]. It records nothing; the coordinator writes the outcome to
//! the seen-URL ledger.

use crate::config::CrawlConfig;
use crate::url::host::{extract_host, host_in_scope};
use crate::url::normalize::normalize_parsed;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Why the filter turned a URL away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Scheme is not in `allowed_schemes`
    Scheme(String),
    /// URL has no host to compare against the seed
    MissingHost,
    /// Host is outside the seed host (and its subdomains, when allowed)
    ForeignHost(String),
    /// Matched the built-in binary/media deny pattern
    CoreInvalid,
    /// Matched a user-supplied deny pattern
    UserInvalid(String),
    /// An allow-list exists and nothing in it matched
    NotAllowListed,
    /// Deeper than `max_link_depth`
    TooDeep { depth: u32, max: u32 },
}

impl Rejection {
    /// Short machine-friendly label, stored in the ledger
    pub fn code(&self) -> &'static str {
        match self {
            Self::Scheme(_) => "scheme",
            Self::MissingHost => "missing_host",
            Self::ForeignHost(_) => "foreign_host",
            Self::CoreInvalid => "core_invalid",
            Self::UserInvalid(_) => "user_invalid",
            Self::NotAllowListed => "not_allow_listed",
            Self::TooDeep { .. } => "too_deep",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheme(scheme) => write!(f, "scheme '{}' not allowed", scheme),
            Self::MissingHost => write!(f, "URL has no host"),
            Self::ForeignHost(host) => write!(f, "host '{}' outside crawl scope", host),
            Self::CoreInvalid => write!(f, "matches built-in invalid link pattern"),
            Self::UserInvalid(pattern) => write!(f, "matches invalid link pattern '{}'", pattern),
            Self::NotAllowListed => write!(f, "matches no valid link pattern"),
            Self::TooDeep { depth, max } => write!(f, "depth {} exceeds max {}", depth, max),
        }
    }
}

/// Decides whether a candidate link may be crawled
#[derive(Debug, Clone)]
pub struct LinkFilter {
    config: Arc<CrawlConfig>,
}

impl LinkFilter {
    pub fn new(config: Arc<CrawlConfig>) -> Self {
        Self { config }
    }

    /// Runs every check in order and returns the normalized URL on acceptance
    ///
    /// Checks short-circuit on the first failure:
    ///
    /// 1. scheme is allowed
    /// 2. host is in scope (only when `own_host_only`)
    /// 3. query and fragment are stripped unless allowed
    /// 4. no deny pattern matches (built-in first, then user patterns)
    /// 5. if an allow-list exists, one of its patterns matches
    /// 6. `depth <= max_link_depth`
    pub fn evaluate(&self, url: &Url, depth: u32) -> Result<Url, Rejection> {
        let config = &*self.config;

        let scheme = url.scheme().to_lowercase();
        if !config.allowed_schemes.iter().any(|s| *s == scheme) {
            return Err(Rejection::Scheme(scheme));
        }

        let host = extract_host(url).ok_or(Rejection::MissingHost)?;
        if config.own_host_only
            && !host_in_scope(&config.seed_host, &host, config.allow_subdomains)
        {
            return Err(Rejection::ForeignHost(host));
        }

        let normalized =
            normalize_parsed(url.clone(), config).map_err(|_| Rejection::MissingHost)?;
        let candidate = normalized.as_str();

        if config.core_invalid_links.is_match(candidate) {
            return Err(Rejection::CoreInvalid);
        }

        if let Some(pattern) = config
            .user_invalid_links
            .iter()
            .find(|re| re.is_match(candidate))
        {
            return Err(Rejection::UserInvalid(pattern.as_str().to_string()));
        }

        if !config.valid_links.is_empty()
            && !config.valid_links.iter().any(|re| re.is_match(candidate))
        {
            return Err(Rejection::NotAllowListed);
        }

        if depth > config.max_link_depth {
            return Err(Rejection::TooDeep {
                depth,
                max: config.max_link_depth,
            });
        }

        Ok(normalized)
    }

    /// Boolean form of [`LinkFilter::evaluate`]
    pub fn accept(&self, url: &Url, depth: u32) -> bool {
        self.evaluate(url, depth).is_ok()
    }
}
