//! Fetch/retry protocol configuration

use serde::{Deserialize, Serialize};

/// What to do when a search fallback is needed but no correction hint was
/// supplied with the request.
///
/// Source deployments disagreed here (some reused the identifier, some gave
/// up), so the policy is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingHintPolicy {
    /// Search with the original identifier instead
    FallBackToIdentifier,
    /// Skip the search fallback and report not-found
    Fail,
}

/// Configuration for the profile fetch protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Direct profile URL; `{id}` is replaced with the encoded identifier
    pub profile_url_template: String,
    /// Search URL used for identifier correction; `{id}` as above
    pub search_url_template: String,
    /// CSS selector for the corrected display identifier on the search page
    pub search_result_selector: String,
    /// Literal marker the site renders when a profile does not exist
    pub not_found_marker: String,
    /// Interstitial phrases, matched case-insensitively against page text.
    ///
    /// Phrase lists varied across site locales; keep this configurable and
    /// seed it with the strings observed so far.
    pub challenge_phrases: Vec<String>,
    /// Full fetch protocol attempts before giving up
    pub max_retries: u32,
    /// Pause between protocol attempts (milliseconds)
    pub retry_delay_ms: u64,
    /// Re-reads of a rendered page when payload extraction fails
    pub parse_retries: u32,
    /// Pause between payload re-reads (milliseconds)
    pub parse_retry_delay_ms: u64,
    /// Navigation timeout (seconds)
    pub navigation_timeout_secs: u64,
    /// How long to wait for a challenge to clear (seconds)
    pub challenge_timeout_secs: u64,
    /// Settle delay after navigation before reading content (milliseconds)
    pub settle_delay_ms: u64,
    /// Search fallback behaviour when the request carries no hint
    pub missing_hint_policy: MissingHintPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            profile_url_template: "https://fortnitetracker.gg/profile/{id}".to_string(),
            search_url_template: "https://fortnitetracker.gg/search?q={id}".to_string(),
            search_result_selector: ".profile-header .player-handle".to_string(),
            not_found_marker: "We could not find a player matching".to_string(),
            challenge_phrases: vec![
                "verifying you are human".to_string(),
                "checking your browser".to_string(),
                "checking if the site connection is secure".to_string(),
                "あなたが人間であることを確認".to_string(),
            ],
            max_retries: 3,
            retry_delay_ms: 3000,
            parse_retries: 2,
            parse_retry_delay_ms: 1500,
            navigation_timeout_secs: 30,
            challenge_timeout_secs: 20,
            settle_delay_ms: 5000,
            missing_hint_policy: MissingHintPolicy::FallBackToIdentifier,
        }
    }
}
