//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients from the fetch configuration
//! - Streaming bodies under the per-document size ceiling
//! - Mime type checks against the allowed list
//! - Retry with exponential backoff for transient failures
//! - Re-checking redirect targets against the link filter
//! - Error classification

use crate::config::{CrawlConfig, FetchConfig};
use crate::crawler::backoff::ExponentialBackoff;
use crate::url::LinkFilter;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Mime type assumed when a response carries no Content-Type
const FALLBACK_MIME: &str = "application/octet-stream";

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// The URL that was requested (the dedup key)
    pub url: Url,
    /// URL after redirects
    pub final_url: Url,
    /// Lowercase mime type without parameters
    pub mime: String,
    /// Body size in bytes
    pub size: u64,
    /// Raw body
    pub content: Vec<u8>,
    /// Crawl depth of `url`
    pub depth: u32,
}

/// Why a fetch produced no document
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Body read interrupted: {0}")]
    Body(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Unsupported mime type '{0}'")]
    UnsupportedMime(String),

    #[error("Content exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Redirect error: {0}")]
    Redirect(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true for failures worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Body(_))
    }

    /// Short machine-friendly label, stored in the ledger
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::Body(_) => "body",
            Self::Status(_) => "http_status",
            Self::UnsupportedMime(_) => "unsupported_mime",
            Self::TooLarge { .. } => "too_large",
            Self::Redirect(_) => "redirect",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Exhausted { last, .. } => last.code(),
            Self::Cancelled => "cancelled",
        }
    }

    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_redirect() {
            Self::Redirect(e.to_string())
        } else if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use tidemark::config::FetchConfig;
/// use tidemark::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches documents for one run, enforcing mime and size limits
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: Arc<CrawlConfig>,
    filter: LinkFilter,
    backoff: ExponentialBackoff,
    max_retries: u32,
}

impl Fetcher {
    pub fn new(client: Client, config: Arc<CrawlConfig>, fetch: &FetchConfig) -> Self {
        Self {
            client,
            filter: LinkFilter::new(Arc::clone(&config)),
            config,
            backoff: ExponentialBackoff::from_config(fetch),
            max_retries: fetch.max_retries,
        }
    }

    /// Fetches a URL with retry for transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Connect error, timeout, body interruption | Retry up to `max_retries` with backoff |
    /// | Redirected to a URL the filter rejects | Immediate failure |
    /// | Non-2xx status | Immediate failure |
    /// | Mime type not allowed | Immediate failure |
    /// | Content-Length or streamed size over the limit | Immediate failure |
    /// | Cancellation | Immediate `Cancelled`, also between retries |
    ///
    /// When retries run out the last error is wrapped in
    /// [`FetchError::Exhausted`].
    pub async fn fetch(
        &self,
        url: &Url,
        depth: u32,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, FetchError> {
        let mut attempt = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = self.fetch_once(url, depth) => result,
            };

            let error = match result {
                Ok(document) => return Ok(document),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            if attempt > self.max_retries {
                return Err(if attempt == 1 {
                    error
                } else {
                    FetchError::Exhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    }
                });
            }

            let delay = self.backoff.delay(attempt - 1);
            tracing::debug!(
                "Transient failure for {} ({}), retry {} in {:?}",
                url,
                error,
                attempt,
                delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn fetch_once(&self, url: &Url, depth: u32) -> Result<FetchedDocument, FetchError> {
        let mut response = self.client.get(url.as_str()).send().await?;

        let final_url = response.url().clone();
        if final_url != *url {
            if let Err(rejection) = self.filter.evaluate(&final_url, depth) {
                return Err(FetchError::Redirect(format!(
                    "redirected to {}: {}",
                    final_url, rejection
                )));
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mime = mime_type(response.headers());
        if !self.config.allows_mime(&mime) {
            return Err(FetchError::UnsupportedMime(mime));
        }

        let limit = self.config.size_limit();
        if let (Some(limit), Some(declared)) = (limit, response.content_length()) {
            if declared > limit {
                return Err(FetchError::TooLarge { limit });
            }
        }

        let mut content = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            content.extend_from_slice(&chunk);
            if let Some(limit) = limit {
                if content.len() as u64 > limit {
                    return Err(FetchError::TooLarge { limit });
                }
            }
        }

        Ok(FetchedDocument {
            url: url.clone(),
            final_url,
            mime,
            size: content.len() as u64,
            content,
            depth,
        })
    }
}

/// Extracts the mime type from Content-Type, lowercased, parameters dropped
fn mime_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}
