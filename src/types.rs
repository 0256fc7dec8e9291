//! Core data types shared across the gateway
//!
//! `RawProfile` mirrors the embedded JSON blob the tracker site ships inside
//! its rendered markup. `ShapedResponse` is the stable shape this service
//! returns to clients. The raw blob is parsed once and consumed once by the
//! shaper; neither type carries behaviour.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Embedded profile payload as found in the rendered page.
///
/// Unknown fields are ignored on purpose: the upstream page ships far more
/// than we consume, and its shape drifts between site deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfile {
    /// Current competitive season number
    pub current_season: i64,
    /// Power-ranking block for the player
    pub power_rank: PowerRank,
    /// Platform identity info
    #[serde(default)]
    pub platform_info: Option<PlatformInfo>,
    /// Region the ranking events belong to
    #[serde(default)]
    pub event_region: Option<String>,
    /// Platform the ranking events belong to
    #[serde(default)]
    pub event_platform: Option<String>,
    /// Event participation history
    #[serde(default)]
    pub my_events: Vec<EventEntry>,
}

/// Upstream power-ranking block, copied verbatim into the shaped response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerRank {
    pub account_id: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub stat_rank: Option<i64>,
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default)]
    pub pr: Option<f64>,
    #[serde(default)]
    pub pr_rank: Option<i64>,
    #[serde(default)]
    pub power_rank: Option<f64>,
    #[serde(default, rename = "lifetimePRRank")]
    pub lifetime_pr_rank: Option<i64>,
    #[serde(default)]
    pub yearly_pr: Option<f64>,
    #[serde(default, rename = "yearlyPRRank")]
    pub yearly_pr_rank: Option<i64>,
    /// Opaque per-event breakdown; passed through untouched
    #[serde(default)]
    pub events: Option<Value>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Platform identity as displayed on the profile page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    #[serde(default)]
    pub platform_user_handle: Option<String>,
}

/// One entry in the player's event history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    #[serde(default)]
    pub windows: Vec<EventWindow>,
}

/// A single scoring window inside an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWindow {
    pub unique_window_id: String,
    #[serde(default)]
    pub window_id: Option<String>,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub event_display_override: Option<EventDisplayOverride>,
    /// Absent for windows the player did not score in
    #[serde(default)]
    pub power_ranking_data: Option<PowerRankingData>,
}

/// Display override carrying the human-readable event title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDisplayOverride {
    #[serde(default, rename = "title_line_1")]
    pub title_line_1: Option<String>,
}

/// Points earned in one scoring window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerRankingData {
    pub points: f64,
    #[serde(default)]
    pub event_rank: Option<i64>,
    #[serde(default)]
    pub event_date: Option<String>,
}

/// Stable API response shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapedResponse {
    pub current_season: i64,
    /// Display handle from the platform identity block
    pub epic_id: Option<String>,
    pub account_id: String,
    pub power_ranking: PowerRank,
    pub event_region: Option<String>,
    pub event_platform: Option<String>,
    /// Per-season point aggregation, keyed by season code (e.g. "S34").
    /// BTreeMap keeps key order deterministic across runs.
    #[serde(rename = "seasonsPR")]
    pub seasons_pr: BTreeMap<String, SeasonSummary>,
    /// Seasonal metadata from the external lookup; empty when unavailable
    pub seasons_data: Vec<Value>,
}

/// Aggregated points and events for one season
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonSummary {
    /// Running sum of event points, rounded to one decimal after each addition
    pub point: f64,
    pub events: Vec<SeasonEvent>,
}

/// One scored event window in the shaped output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonEvent {
    pub window_id: Option<String>,
    pub session_name: Option<String>,
    pub event_title: Option<String>,
    /// Canonical event identifier (the full unique window id)
    pub event_name: String,
    pub point: f64,
    pub event_rank: Option<i64>,
    pub event_date: Option<String>,
}
