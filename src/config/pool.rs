//! Tab pool configuration

use serde::{Deserialize, Serialize};

/// Configuration for the shared tab pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of tabs, and therefore concurrent fetches
    pub capacity: usize,
    /// Close a free tab after this many seconds without use.
    ///
    /// Source deployments disagreed on the right scale for this (minutes vs
    /// days), so it is configuration rather than a constant.
    pub idle_window_secs: u64,
    /// Give up waiting for a free tab after this many seconds
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            idle_window_secs: 300,
            acquire_timeout_secs: 60,
        }
    }
}
