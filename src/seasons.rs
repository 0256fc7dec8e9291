//! Seasonal metadata lookup
//!
//! Enriches shaped responses with the public season list from an external
//! API, behind a two-level read-through cache (process memory, then a JSON
//! file). The cache is considered fresh as long as its newest entry covers
//! the season the scraped profile reports; a season rollover is what forces
//! a refetch. Lookup failures degrade to stale data or an empty list, never
//! to a failed profile response.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SeasonsConfig;

#[derive(Debug, Error)]
enum LookupError {
    #[error("no API key configured")]
    NoApiKey,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Shape(String),
    #[error("cache file unusable: {0}")]
    Cache(String),
}

/// Season list as the remote endpoint returns it
#[derive(Deserialize)]
struct SeasonListBody {
    #[serde(default)]
    seasons: Vec<Value>,
}

/// Cached season list lookup
pub struct SeasonService {
    config: SeasonsConfig,
    client: reqwest::Client,
    memory: Mutex<Option<Vec<Value>>>,
}

impl SeasonService {
    pub fn new(config: SeasonsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            memory: Mutex::new(None),
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Season list covering `current_season`, freshest source first.
    ///
    /// Returns an empty list when nothing usable is available; the caller
    /// ships the profile either way.
    pub async fn seasons_for(&self, current_season: i64) -> Vec<Value> {
        let mut memory = self.memory.lock().await;

        if let Some(cached) = memory.as_ref() {
            if covers(cached, current_season) {
                return cached.clone();
            }
            debug!(current_season, "In-memory season list is behind, refreshing");
        }

        if memory.is_none() {
            match self.read_cache_file().await {
                Ok(seasons) => {
                    if covers(&seasons, current_season) {
                        debug!(path = %self.config.cache_path.display(), "Season cache file is fresh");
                        let out = seasons.clone();
                        *memory = Some(seasons);
                        return out;
                    }
                    // Keep it around as the stale fallback
                    *memory = Some(seasons);
                }
                Err(e) => debug!("No usable season cache file: {}", e),
            }
        }

        match self.fetch_remote().await {
            Ok(seasons) => {
                info!(count = seasons.len(), "Refreshed season list from remote");
                self.write_cache_file(&seasons).await;
                let out = seasons.clone();
                *memory = Some(seasons);
                out
            }
            Err(e) => {
                warn!("Season list refresh failed, serving stale data: {}", e);
                memory.clone().unwrap_or_default()
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<Value>, LookupError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(LookupError::NoApiKey);
        };

        let body: SeasonListBody = self
            .client
            .get(&self.config.endpoint)
            .header("Authorization", api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.seasons.is_empty() {
            return Err(LookupError::Shape("empty season list".to_string()));
        }
        Ok(strip_patch_lists(body.seasons))
    }

    async fn read_cache_file(&self) -> Result<Vec<Value>, LookupError> {
        let bytes = tokio::fs::read(&self.config.cache_path)
            .await
            .map_err(|e| LookupError::Cache(e.to_string()))?;
        let seasons: Vec<Value> =
            serde_json::from_slice(&bytes).map_err(|e| LookupError::Cache(e.to_string()))?;
        if seasons.is_empty() {
            return Err(LookupError::Cache("empty cache file".to_string()));
        }
        Ok(seasons)
    }

    /// Best effort; a read-only disk costs us the cache, not the response.
    async fn write_cache_file(&self, seasons: &[Value]) {
        match serde_json::to_vec_pretty(seasons) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&self.config.cache_path, bytes).await {
                    warn!(path = %self.config.cache_path.display(), "Could not write season cache: {}", e);
                }
            }
            Err(e) => warn!("Could not serialize season cache: {}", e),
        }
    }
}

/// Whether the newest cached entry covers the given season.
fn covers(seasons: &[Value], current_season: i64) -> bool {
    seasons
        .last()
        .and_then(|s| s.get("season"))
        .and_then(Value::as_i64)
        .map(|last| last >= current_season)
        .unwrap_or(false)
}

/// The per-patch changelog dwarfs the rest of each entry and no client
/// reads it; drop it before caching.
fn strip_patch_lists(mut seasons: Vec<Value>) -> Vec<Value> {
    for season in &mut seasons {
        if let Some(obj) = season.as_object_mut() {
            obj.remove("patchList");
        }
    }
    seasons
}
