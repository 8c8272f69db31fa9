use crate::config::crawl::CrawlConfig;
use crate::config::types::AppConfig;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// A loaded configuration together with its validated crawl settings
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub app: AppConfig,
    pub crawl: CrawlConfig,
    /// Hex-encoded SHA-256 of the configuration file
    pub hash: String,
}

/// Loads, parses and validates a configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(LoadedConfig)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use tidemark::config::load_config;
///
/// let loaded = load_config(Path::new("tidemark.toml")).unwrap();
/// println!("Seed: {}", loaded.crawl.seed);
/// ```
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<LoadedConfig, ConfigError> {
    let app: AppConfig = toml::from_str(content)?;
    let crawl = validate(&app)?;

    Ok(LoadedConfig {
        app,
        crawl,
        hash: hash_content(content),
    })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded on every run so a resumed run can tell whether the
/// configuration changed underneath it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[provider]
context = "docs"
state-path = "./state.db"
concurrency = 8
ledger-policy = "resume-interrupted"

[fetch]
user-agent = "TestBot/1.0"
max-retries = 2

[index]
directory = "./index"
database-name = "site_search"

[crawl]
seed = "https://example.com/"
own-host-only = true
allowed-schemes = ["http", "https"]
max-link-depth = 3
max-crawl-limit = 100
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let loaded = load_config(file.path()).unwrap();

        assert_eq!(loaded.app.provider.context, "docs");
        assert_eq!(loaded.app.provider.concurrency, 8);
        assert_eq!(
            loaded.app.provider.ledger_policy,
            LedgerPolicy::ResumeInterrupted
        );
        assert_eq!(loaded.app.fetch.max_retries, 2);
        assert_eq!(loaded.app.fetch.timeout_secs, 30);
        assert_eq!(loaded.app.index.database_name, "site_search");
        assert!(!loaded.app.index.auto_promote);
        assert_eq!(loaded.crawl.seed_host, "example.com");
        assert!(loaded.crawl.own_host_only);
        assert_eq!(loaded.crawl.max_link_depth, 3);
        assert_eq!(loaded.crawl.crawl_limit(), Some(100));
        assert_eq!(loaded.hash.len(), 64);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let loaded = parse_config(
            r#"
[index]
directory = "./index"

[crawl]
seed = "http://example.com/"
"#,
        )
        .unwrap();

        assert_eq!(loaded.app.provider.context, "default");
        assert_eq!(loaded.app.provider.concurrency, 4);
        assert_eq!(
            loaded.app.provider.ledger_policy,
            LedgerPolicy::ResetOnWarmUp
        );
        assert_eq!(loaded.app.index.database_name, "default");
        assert_eq!(loaded.crawl.max_link_depth, 15);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/tidemark.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = parse_config(
            r#"
[index]
directory = "./index"

[crawl]
seed = "http://example.com/"
respect-robots = true
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_mistyped_key_rejected() {
        let result = parse_config(
            r#"
[index]
directory = "./index"

[crawl]
seed = "http://example.com/"
own-host-only = "yes"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let result = parse_config(
            r#"
[provider]
concurrency = 0

[index]
directory = "./index"

[crawl]
seed = "http://example.com/"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
