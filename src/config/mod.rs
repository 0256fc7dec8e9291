//! Configuration for the rankgate service

mod browser;
mod fetch;
mod http;
mod logging;
mod pool;
mod seasons;

pub use browser::BrowserConfig;
pub use fetch::{FetchConfig, MissingHintPolicy};
pub use http::HttpConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use pool::PoolConfig;
pub use seasons::SeasonsConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for browser tabs.
///
/// A realistic desktop UA: Chrome's headless mode injects "HeadlessChrome"
/// into its default UA, which the target site trivially detects.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Main configuration for the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP API server configuration
    #[serde(default)]
    pub http: HttpConfig,
    /// Browser engine configuration
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Tab pool configuration
    #[serde(default)]
    pub pool: PoolConfig,
    /// Fetch/retry protocol configuration
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Seasonal metadata lookup configuration
    #[serde(default)]
    pub seasons: SeasonsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.pool.capacity == 0 {
            errors.push("pool capacity must be at least 1".to_string());
        }
        if self.pool.idle_window_secs == 0 {
            errors.push("pool idle_window_secs must be positive".to_string());
        }
        if self.pool.acquire_timeout_secs == 0 {
            errors.push("pool acquire_timeout_secs must be positive".to_string());
        }

        if self.fetch.max_retries == 0 {
            errors.push("fetch max_retries must be at least 1".to_string());
        }
        if !self.fetch.profile_url_template.contains("{id}") {
            errors.push("fetch profile_url_template must contain an {id} placeholder".to_string());
        }
        if !self.fetch.search_url_template.contains("{id}") {
            errors.push("fetch search_url_template must contain an {id} placeholder".to_string());
        }
        if self.fetch.challenge_phrases.is_empty() {
            errors.push("fetch challenge_phrases must not be empty".to_string());
        }
        if self.fetch.not_found_marker.is_empty() {
            errors.push("fetch not_found_marker must not be empty".to_string());
        }
        if scraper::Selector::parse(&self.fetch.search_result_selector).is_err() {
            errors.push(format!(
                "fetch search_result_selector '{}' is not a valid CSS selector",
                self.fetch.search_result_selector
            ));
        }

        if self.http.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "http listen_addr '{}' is not a valid socket address",
                self.http.listen_addr
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "))
        }
    }
}
