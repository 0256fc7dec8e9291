//! Raw profile → stable API response
//!
//! Pure transform. Identity and ranking fields are copied verbatim; the
//! event windows are folded into a per-season point aggregation.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{RawProfile, SeasonEvent, SeasonSummary, ShapedResponse};

/// Window ids look like `epicgames_S34_FNCS_...`; the season code is the
/// fixed-width chunk right after the vendor prefix.
const WINDOW_ID_PREFIX: &str = "epicgames_";
const SEASON_KEY_LEN: usize = 3;

/// Shape a raw profile into the service's response.
///
/// The per-season `point` is a running sum rounded to one decimal after
/// every addition, not once at the end. Accumulation order can shift the
/// result at the margin, so this must stay bit-for-bit compatible with the
/// historical behaviour clients already depend on.
pub fn transform(raw: &RawProfile, seasons_data: Vec<Value>) -> ShapedResponse {
    let mut seasons_pr: BTreeMap<String, SeasonSummary> = BTreeMap::new();

    for entry in &raw.my_events {
        for window in &entry.windows {
            let Some(ranking) = &window.power_ranking_data else {
                continue;
            };
            let key = season_key(&window.unique_window_id);
            let summary = seasons_pr.entry(key).or_insert_with(|| SeasonSummary {
                point: 0.0,
                events: Vec::new(),
            });
            summary.point = round_one_decimal(summary.point + ranking.points);
            summary.events.push(SeasonEvent {
                window_id: window.window_id.clone(),
                session_name: window.session_name.clone(),
                event_title: window
                    .event_display_override
                    .as_ref()
                    .and_then(|o| o.title_line_1.clone()),
                event_name: window.unique_window_id.clone(),
                point: ranking.points,
                event_rank: ranking.event_rank,
                event_date: ranking.event_date.clone(),
            });
        }
    }

    ShapedResponse {
        current_season: raw.current_season,
        epic_id: raw
            .platform_info
            .as_ref()
            .and_then(|p| p.platform_user_handle.clone()),
        account_id: raw.power_rank.account_id.clone(),
        power_ranking: raw.power_rank.clone(),
        event_region: raw.event_region.clone(),
        event_platform: raw.event_platform.clone(),
        seasons_pr,
        seasons_data,
    }
}

fn season_key(unique_window_id: &str) -> String {
    let stripped = unique_window_id
        .strip_prefix(WINDOW_ID_PREFIX)
        .unwrap_or(unique_window_id);
    stripped.chars().take(SEASON_KEY_LEN).collect()
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        EventEntry, EventWindow, PlatformInfo, PowerRank, PowerRankingData, RawProfile,
    };

    fn power_rank() -> PowerRank {
        PowerRank {
            account_id: "a1".to_string(),
            region: Some("ASIA".to_string()),
            platform: Some("pc".to_string()),
            stat_rank: Some(12),
            points: Some(2450.3),
            pr: Some(2450.3),
            pr_rank: Some(12),
            power_rank: None,
            lifetime_pr_rank: Some(40),
            yearly_pr: Some(830.0),
            yearly_pr_rank: Some(18),
            events: None,
            last_updated: Some("2024-01-02".to_string()),
        }
    }

    fn window(unique_id: &str, points: Option<f64>) -> EventWindow {
        EventWindow {
            unique_window_id: unique_id.to_string(),
            window_id: Some(format!("w_{unique_id}")),
            session_name: Some("Session".to_string()),
            event_display_override: None,
            power_ranking_data: points.map(|p| PowerRankingData {
                points: p,
                event_rank: Some(3),
                event_date: Some("2024-01-01".to_string()),
            }),
        }
    }

    fn profile(windows: Vec<EventWindow>) -> RawProfile {
        RawProfile {
            current_season: 34,
            power_rank: power_rank(),
            platform_info: Some(PlatformInfo {
                platform_user_handle: Some("player1".to_string()),
            }),
            event_region: Some("ASIA".to_string()),
            event_platform: Some("pc".to_string()),
            my_events: vec![EventEntry { windows }],
        }
    }

    #[test]
    fn single_window_lands_under_its_season_key() {
        let raw = profile(vec![window("epicgames_S34_abc", Some(12.5))]);
        let shaped = transform(&raw, Vec::new());

        let s34 = &shaped.seasons_pr["S34"];
        assert_eq!(s34.point, 12.5);
        assert_eq!(s34.events.len(), 1);
        assert_eq!(s34.events[0].event_name, "epicgames_S34_abc");
        assert_eq!(s34.events[0].event_rank, Some(3));
        assert_eq!(shaped.epic_id.as_deref(), Some("player1"));
        assert_eq!(shaped.account_id, "a1");
    }

    #[test]
    fn windows_without_ranking_data_are_skipped() {
        let raw = profile(vec![
            window("epicgames_S34_abc", Some(10.0)),
            window("epicgames_S34_def", None),
        ]);
        let shaped = transform(&raw, Vec::new());
        assert_eq!(shaped.seasons_pr["S34"].events.len(), 1);
        assert_eq!(shaped.seasons_pr["S34"].point, 10.0);
    }

    #[test]
    fn points_accumulate_per_season() {
        let raw = profile(vec![
            window("epicgames_S33_a", Some(5.0)),
            window("epicgames_S34_b", Some(7.5)),
            window("epicgames_S34_c", Some(2.5)),
        ]);
        let shaped = transform(&raw, Vec::new());
        assert_eq!(shaped.seasons_pr["S33"].point, 5.0);
        assert_eq!(shaped.seasons_pr["S34"].point, 10.0);
        assert_eq!(shaped.seasons_pr.len(), 2);
    }

    #[test]
    fn sum_is_rounded_after_every_addition() {
        // Rounding the running sum: 0.14 -> 0.1, +0.14 -> 0.2, +0.14 -> 0.3.
        // Rounding once at the end would give round(0.42) = 0.4 instead.
        let raw = profile(vec![
            window("epicgames_S34_a", Some(0.14)),
            window("epicgames_S34_b", Some(0.14)),
            window("epicgames_S34_c", Some(0.14)),
        ]);
        let shaped = transform(&raw, Vec::new());
        assert_eq!(shaped.seasons_pr["S34"].point, 0.3);
    }

    #[test]
    fn unprefixed_window_id_still_yields_a_key() {
        let raw = profile(vec![window("S30_legacy", Some(1.0))]);
        let shaped = transform(&raw, Vec::new());
        assert!(shaped.seasons_pr.contains_key("S30"));
    }

    #[test]
    fn transform_is_deterministic() {
        let raw = profile(vec![
            window("epicgames_S34_a", Some(3.3)),
            window("epicgames_S33_b", Some(1.1)),
        ]);
        let first = serde_json::to_vec(&transform(&raw, Vec::new())).unwrap();
        let second = serde_json::to_vec(&transform(&raw, Vec::new())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn seasons_data_is_passed_through() {
        let raw = profile(Vec::new());
        let data = vec![serde_json::json!({"season": 34, "chapter": "5"})];
        let shaped = transform(&raw, data.clone());
        assert_eq!(shaped.seasons_data, data);
    }

    #[test]
    fn serialized_shape_uses_stable_field_names() {
        let raw = profile(vec![window("epicgames_S34_abc", Some(12.5))]);
        let value = serde_json::to_value(transform(&raw, Vec::new())).unwrap();
        assert!(value.get("seasonsPR").is_some());
        assert!(value.get("currentSeason").is_some());
        assert!(value.get("powerRanking").is_some());
        assert!(value["seasonsPR"]["S34"]["events"][0].get("eventName").is_some());
    }
}
