//! Configuration file parser for ~/.config/feedvoice/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use crate::feed::FeedFetcher;
use crate::reader::ReaderTiming;
use crate::util::HostPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RSS/Atom feed to read.
    pub feed_url: String,

    /// Maximum number of entries to read; capped to what the feed has.
    pub feed_count: usize,

    /// Entry properties to speak, in order (e.g. "title", "summary").
    pub properties: Vec<String>,

    /// Sysfs GPIO number of the stop button's line. Absent = no button.
    /// On newer Raspberry Pi kernels this is the BCM number plus the
    /// gpiochip base (e.g. 512 + 23).
    pub button_pin: Option<u32>,

    /// Milliseconds between two reads of the button pin. 0 = spin.
    pub button_poll_ms: u64,

    /// Milliseconds between two checks of the cancellation signal.
    pub wait_poll_ms: u64,

    /// Feed request timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Program run as `<command> <text>` to speak each line. Absent = print to stdout.
    pub speak_command: Option<String>,

    /// Accept feed URLs on localhost or private networks.
    pub allow_private_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "http://feeds.bbci.co.uk/news/rss.xml?edition=uk#".to_string(),
            feed_count: 10,
            properties: vec!["title".to_string()],
            button_pin: Some(23),
            button_poll_ms: 10,
            wait_poll_ms: 100,
            fetch_timeout_secs: 30,
            speak_command: None,
            allow_private_hosts: false,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "feed_url",
        "feed_count",
        "properties",
        "button_pin",
        "button_poll_ms",
        "wait_poll_ms",
        "fetch_timeout_secs",
        "speak_command",
        "allow_private_hosts",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            feed = %config.feed_url,
            count = config.feed_count,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Polling intervals derived from this configuration.
    ///
    /// A zero wait interval is raised to 1 ms; a zero button interval is kept
    /// and means the listener spins.
    pub fn timing(&self) -> ReaderTiming {
        ReaderTiming {
            wait_interval: Duration::from_millis(self.wait_poll_ms.max(1)),
            button_interval: Duration::from_millis(self.button_poll_ms),
        }
    }

    /// Feed fetcher honoring the timeout and host policy settings.
    pub fn fetcher(&self) -> FeedFetcher {
        let policy = if self.allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        };
        FeedFetcher::default()
            .with_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_host_policy(policy)
    }
}

// ============================================================================
// Tests
// ============================================================================
