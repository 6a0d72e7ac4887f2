use crate::feed::parser::{parse_feed, FeedEntry};
use crate::util::{validate_url_with_policy, HostPolicy, UrlValidationError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while fetching a feed.
///
/// Callers that only care whether entries are available treat every variant
/// as "feed unavailable"; the distinct causes exist for logging.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL failed validation before any request was made
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Feed parsed but contained no entries
    #[error("Feed has no entries")]
    EmptyFeed,
}

/// Fetches a feed over HTTP and returns a bounded prefix of its entries.
///
/// Each call performs exactly one request; there is no retry or backoff.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    host_policy: HostPolicy,
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            host_policy: HostPolicy::PublicOnly,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_host_policy(mut self, policy: HostPolicy) -> Self {
        self.host_policy = policy;
        self
    }

    /// Fetches `url` and returns at most `max_count` entries in feed order.
    ///
    /// # Errors
    ///
    /// - [`FetchError::EmptyFeed`] - The feed parsed but has zero entries
    /// - [`FetchError::InvalidUrl`] - Scheme or host rejected before fetching
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] - Transport failure
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::ResponseTooLarge`] / [`FetchError::IncompleteResponse`] - Bad body
    /// - [`FetchError::Parse`] - Invalid RSS/Atom XML
    pub async fn fetch(&self, url: &str, max_count: usize) -> Result<Vec<FeedEntry>, FetchError> {
        let url = validate_url_with_policy(url, self.host_policy)?;

        let response = tokio::time::timeout(self.timeout, self.client.get(url.as_str()).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = tokio::time::timeout(self.timeout, read_limited_bytes(response, MAX_FEED_SIZE))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let entries = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        let available = entries.len();
        let entries = cap_entries(entries, max_count)?;
        tracing::debug!(
            feed = %url,
            available = available,
            returned = entries.len(),
            "Fetched feed"
        );

        Ok(entries)
    }
}

/// Caps `entries` to `max_count`, keeping feed order.
///
/// An empty input is [`FetchError::EmptyFeed`]; asking for more than is
/// available returns everything without padding.
pub fn cap_entries(
    mut entries: Vec<FeedEntry>,
    max_count: usize,
) -> Result<Vec<FeedEntry>, FetchError> {
    if entries.is_empty() {
        return Err(FetchError::EmptyFeed);
    }
    entries.truncate(max_count);
    Ok(entries)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
