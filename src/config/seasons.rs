//! Seasonal metadata lookup configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the external seasonal-metadata lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonsConfig {
    /// Remote endpoint listing all seasons
    pub endpoint: String,
    /// Local read-through cache file
    pub cache_path: PathBuf,
    /// API key sent in the Authorization header.
    ///
    /// The FORTNITE_API_KEY environment variable overrides this at startup.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for SeasonsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://fortniteapi.io/v1/seasons/list?lang=ja".to_string(),
            cache_path: PathBuf::from("seasons.json"),
            api_key: None,
        }
    }
}

impl SeasonsConfig {
    /// Apply the environment override for the API key.
    pub fn resolve_api_key(&mut self) {
        if let Ok(key) = std::env::var("FORTNITE_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
    }
}
