//! Browser engine configuration

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// Configuration for the shared headless browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run the browser headless
    pub headless: bool,
    /// Path to the Chrome/Chromium executable; auto-detected when unset
    pub chrome_path: Option<String>,
    /// User agent override for all tabs
    pub user_agent: String,
    /// Additional launch arguments
    #[serde(default)]
    pub launch_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            launch_args: Vec::new(),
        }
    }
}
