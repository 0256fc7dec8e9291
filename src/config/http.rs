//! HTTP API server configuration

use serde::{Deserialize, Serialize};

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address for the HTTP server
    pub listen_addr: String,
    /// Enable CORS (useful for browser-based clients)
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            // Port carried over from the service this gateway replaces
            listen_addr: "0.0.0.0:9999".to_string(),
            cors_enabled: false,
        }
    }
}
