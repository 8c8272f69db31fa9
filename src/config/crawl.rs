use crate::config::types::CrawlOptions;
use crate::url::compile_pattern;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validated, immutable crawl configuration
///
/// Built once per run by [`CrawlConfig::new`], the only constructor. Patterns
/// are compiled, the seed is parsed, and scheme/mime lists are lowercased so
/// the filter and fetcher never re-validate anything.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seed: Url,
    pub seed_host: String,
    pub own_host_only: bool,
    pub allow_subdomains: bool,
    pub allow_query_in_url: bool,
    pub allow_hash_in_url: bool,
    pub valid_links: Vec<Regex>,
    pub user_invalid_links: Vec<Regex>,
    pub core_invalid_links: Regex,
    pub allowed_mime_types: Vec<String>,
    pub allowed_schemes: Vec<String>,
    pub max_link_depth: u32,
    pub max_crawl_limit: u64,
    pub content_max_size: u64,
}

impl CrawlConfig {
    /// Validates raw options and builds the run configuration
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidUrl` - seed is not an absolute URL with a host
    /// * `ConfigError::InvalidPattern` - a link pattern does not compile
    /// * `ConfigError::Validation` - empty scheme/mime lists, malformed entries,
    ///   or a seed whose scheme is not allowed
    pub fn new(options: &CrawlOptions) -> Result<Self, ConfigError> {
        let seed = Url::parse(&options.seed).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", options.seed, e))
        })?;
        let seed_host = seed
            .host_str()
            .map(|h| h.to_lowercase())
            .ok_or_else(|| {
                ConfigError::InvalidUrl(format!("Seed URL '{}' has no host", options.seed))
            })?;

        let allowed_schemes = lowercase_list("allowed-schemes", &options.allowed_schemes)?;
        if !allowed_schemes.iter().any(|s| s == seed.scheme()) {
            return Err(ConfigError::Validation(format!(
                "Seed scheme '{}' is not in allowed-schemes {:?}",
                seed.scheme(),
                allowed_schemes
            )));
        }

        let allowed_mime_types =
            lowercase_list("allowed-mime-types", &options.allowed_mime_types)?;
        if let Some(bad) = allowed_mime_types.iter().find(|m| !m.contains('/')) {
            return Err(ConfigError::Validation(format!(
                "allowed-mime-types entry '{}' is not a type/subtype pair",
                bad
            )));
        }

        let valid_links = options
            .valid_links
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        let user_invalid_links = options
            .user_invalid_links
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        let core_invalid_links = compile_pattern(&options.core_invalid_links)?;

        Ok(Self {
            seed,
            seed_host,
            own_host_only: options.own_host_only,
            allow_subdomains: options.allow_subdomains,
            allow_query_in_url: options.allow_query_in_url,
            allow_hash_in_url: options.allow_hash_in_url,
            valid_links,
            user_invalid_links,
            core_invalid_links,
            allowed_mime_types,
            allowed_schemes,
            max_link_depth: options.max_link_depth,
            max_crawl_limit: options.max_crawl_limit,
            content_max_size: options.content_max_size,
        })
    }

    /// Builds the configuration from an untyped option map handed over by the host
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        let options: CrawlOptions = serde_json::from_value(value)
            .map_err(|e| ConfigError::Validation(format!("Invalid crawl options: {}", e)))?;
        Self::new(&options)
    }

    /// Accepted-document ceiling, `None` when unlimited
    pub fn crawl_limit(&self) -> Option<u64> {
        (self.max_crawl_limit > 0).then_some(self.max_crawl_limit)
    }

    /// Per-document byte ceiling, `None` when unlimited
    pub fn size_limit(&self) -> Option<u64> {
        (self.content_max_size > 0).then_some(self.content_max_size)
    }

    /// Whether a (lowercase, parameter-free) mime type may be indexed
    pub fn allows_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime)
    }
}

fn lowercase_list(field: &str, values: &[String]) -> Result<Vec<String>, ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
    }

    values
        .iter()
        .map(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                Err(ConfigError::Validation(format!(
                    "{} cannot contain empty entries",
                    field
                )))
            } else {
                Ok(trimmed.to_lowercase())
            }
        })
        .collect()
}
