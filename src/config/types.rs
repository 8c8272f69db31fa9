use serde::Deserialize;

/// Built-in deny pattern for binary and media resources
pub const CORE_INVALID_LINKS: &str = r".*\.(js|JS|gif|GIF|jpg|JPG|png|PNG|ico|ICO|eps|jpeg|JPEG|bmp|BMP|css|CSS|sit|wmf|zip|ppt|mpg|xls|gz|rpm|tgz|mov|MOV|exe|mp3|MP3|kmz|gpx|kml|swf|SWF)$";

/// Main configuration structure for Tidemark
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    pub index: IndexConfig,

    pub crawl: CrawlOptions,
}

/// Provider-level settings: where the ledger lives and how many workers fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Context name; every ledger row is keyed by it
    #[serde(default = "default_context")]
    pub context: String,

    /// Path to the SQLite ledger database
    #[serde(rename = "state-path", default = "default_state_path")]
    pub state_path: String,

    /// Number of concurrent fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Whether warm-up clears the ledger or resumes an interrupted run
    #[serde(rename = "ledger-policy", default)]
    pub ledger_policy: LedgerPolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            state_path: default_state_path(),
            concurrency: default_concurrency(),
            ledger_policy: LedgerPolicy::default(),
        }
    }
}

/// What warm-up does with seen-URL state left behind by a previous process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerPolicy {
    /// Every run starts from an empty ledger
    #[default]
    ResetOnWarmUp,

    /// A run left in `running` state by a crash is resumed instead of cleared
    ResumeInterrupted,
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Index storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Directory holding index databases
    pub directory: String,

    /// Name of the index database inside `directory`
    #[serde(rename = "database-name", default = "default_database_name")]
    pub database_name: String,

    /// Promote genesis to stable as soon as a run completes cleanly
    #[serde(rename = "auto-promote", default)]
    pub auto_promote: bool,
}

/// Raw crawl options as supplied by the host pipeline
///
/// Every option except `seed` has a default, so after deserialization all
/// keys are present. Unknown keys and mistyped values are rejected by serde;
/// semantic checks happen in [`crate::config::CrawlConfig::new`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlOptions {
    /// Seed URL for INSERT runs, also the base for relative runtime paths
    pub seed: String,

    #[serde(rename = "own-host-only", default)]
    pub own_host_only: bool,

    #[serde(rename = "allow-subdomains", default)]
    pub allow_subdomains: bool,

    #[serde(rename = "allow-query-in-url", default)]
    pub allow_query_in_url: bool,

    #[serde(rename = "allow-hash-in-url", default)]
    pub allow_hash_in_url: bool,

    /// Allow-list patterns; when non-empty a URL must match one of them
    #[serde(rename = "valid-links", default)]
    pub valid_links: Vec<String>,

    /// User-supplied deny-list patterns
    #[serde(rename = "user-invalid-links", default)]
    pub user_invalid_links: Vec<String>,

    /// Built-in deny pattern (binary/media extensions)
    #[serde(rename = "core-invalid-links", default = "default_core_invalid_links")]
    pub core_invalid_links: String,

    #[serde(rename = "allowed-mime-types", default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,

    #[serde(rename = "allowed-schemes", default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,

    #[serde(rename = "max-link-depth", default = "default_max_link_depth")]
    pub max_link_depth: u32,

    /// Accepted-document ceiling (0 = unlimited)
    #[serde(rename = "max-crawl-limit", default)]
    pub max_crawl_limit: u64,

    /// Per-document byte ceiling (0 = unlimited)
    #[serde(rename = "content-max-size", default)]
    pub content_max_size: u64,
}

impl CrawlOptions {
    /// Options for `seed` with every other field at its default
    pub fn with_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            own_host_only: false,
            allow_subdomains: false,
            allow_query_in_url: false,
            allow_hash_in_url: false,
            valid_links: Vec::new(),
            user_invalid_links: Vec::new(),
            core_invalid_links: default_core_invalid_links(),
            allowed_mime_types: default_allowed_mime_types(),
            allowed_schemes: default_allowed_schemes(),
            max_link_depth: default_max_link_depth(),
            max_crawl_limit: 0,
            content_max_size: 0,
        }
    }
}

fn default_context() -> String {
    "default".to_string()
}

fn default_state_path() -> String {
    "./tidemark-state.db".to_string()
}

fn default_concurrency() -> u32 {
    4
}

fn default_user_agent() -> String {
    format!("tidemark/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_max_ms() -> u64 {
    5_000
}

fn default_database_name() -> String {
    "default".to_string()
}

fn default_core_invalid_links() -> String {
    CORE_INVALID_LINKS.to_string()
}

fn default_allowed_mime_types() -> Vec<String> {
    vec!["text/html".to_string(), "application/pdf".to_string()]
}

fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string()]
}

fn default_max_link_depth() -> u32 {
    15
}
