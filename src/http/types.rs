//! HTTP API request/response types

use serde::{Deserialize, Serialize};

use crate::pool::PoolStats;

/// Query parameters of the profile endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileQuery {
    /// Correction hint for the search fallback
    pub id: Option<String>,
}

/// Body of the legacy direct-URL endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UserRequest {
    pub url: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

/// Occupancy snapshot of the pool and queue
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub pool: PoolStats,
    pub active_tasks: usize,
    pub queued_tasks: usize,
}

/// Stable JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("SCRAPE_FAILED", message)
    }
}
