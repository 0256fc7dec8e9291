//! Integration tests for the scraping gateway
//!
//! Wire the real task queue, tab pool, fetch protocol, shaper and season
//! service together over the scripted browser driver and exercise them the
//! way a request does.

use std::sync::Arc;

use rankgate::browser::scripted::{ScriptedEngine, Step};
use rankgate::config::{FetchConfig, MissingHintPolicy, PoolConfig, SeasonsConfig};
use rankgate::pool::SessionPool;
use rankgate::queue::{ScrapeTask, TaskQueue};
use rankgate::scrape::{FetchError, ProfileFetcher};
use rankgate::seasons::SeasonService;
use serde_json::json;
use tempfile::TempDir;

const PROFILE_URL: &str = "https://tracker.test/profile/player1";
const SEARCH_URL: &str = "https://tracker.test/search?q=player1";
const CORRECTED_URL: &str = "https://tracker.test/profile/Player_One";

fn profile_page() -> String {
    r#"<html><head><script>
        const profile = {
            "currentSeason": 34,
            "powerRank": {"accountId": "acct-1", "region": "ASIA", "pr": 2450.3, "prRank": 12},
            "platformInfo": {"platformUserHandle": "player1"},
            "eventRegion": "ASIA",
            "myEvents": [{"windows": [
                {"uniqueWindowId": "epicgames_S34_FNCS_week1",
                 "windowId": "w1", "sessionName": "FNCS Week 1",
                 "powerRankingData": {"points": 12.5, "eventRank": 3, "eventDate": "2024-06-01"}},
                {"uniqueWindowId": "epicgames_S34_FNCS_week2",
                 "windowId": "w2", "sessionName": "FNCS Week 2",
                 "powerRankingData": {"points": 7.5, "eventRank": 8, "eventDate": "2024-06-08"}},
                {"uniqueWindowId": "epicgames_S33_cash_cup",
                 "windowId": "w3", "sessionName": "Cash Cup",
                 "powerRankingData": {"points": 5.0, "eventRank": 20, "eventDate": "2024-03-01"}}
            ]}]
        };
    </script></head><body>profile</body></html>"#
        .to_string()
}

fn missing_page() -> String {
    "<html><body>We could not find a player matching your query</body></html>".to_string()
}

fn fetch_config() -> FetchConfig {
    FetchConfig {
        profile_url_template: "https://tracker.test/profile/{id}".to_string(),
        search_url_template: "https://tracker.test/search?q={id}".to_string(),
        search_result_selector: ".player-handle".to_string(),
        not_found_marker: "We could not find a player matching".to_string(),
        challenge_phrases: vec!["verifying you are human".to_string()],
        max_retries: 3,
        retry_delay_ms: 50,
        parse_retries: 2,
        parse_retry_delay_ms: 20,
        navigation_timeout_secs: 5,
        challenge_timeout_secs: 1,
        settle_delay_ms: 10,
        missing_hint_policy: MissingHintPolicy::FallBackToIdentifier,
    }
}

struct Gateway {
    engine: ScriptedEngine,
    queue: Arc<TaskQueue>,
    pool: Arc<SessionPool>,
    _seasons_dir: TempDir,
}

async fn gateway(capacity: usize, cached_seasons: Option<serde_json::Value>) -> Gateway {
    let engine = ScriptedEngine::new();
    let pool = SessionPool::new(
        Arc::new(engine.clone()),
        PoolConfig {
            capacity,
            idle_window_secs: 600,
            acquire_timeout_secs: 2,
        },
    );

    let seasons_dir = TempDir::new().unwrap();
    let cache_path = seasons_dir.path().join("seasons.json");
    if let Some(seasons) = &cached_seasons {
        tokio::fs::write(&cache_path, serde_json::to_vec(seasons).unwrap())
            .await
            .unwrap();
    }
    let seasons = SeasonService::new(SeasonsConfig {
        endpoint: "http://127.0.0.1:9/seasons".to_string(),
        cache_path,
        api_key: None,
    })
    .into_shared();

    let fetcher = ProfileFetcher::new(Arc::clone(&pool), fetch_config(), seasons).unwrap();
    let queue = TaskQueue::start(Arc::new(fetcher), capacity);

    Gateway {
        engine,
        queue,
        pool,
        _seasons_dir: seasons_dir,
    }
}

#[tokio::test(start_paused = true)]
async fn profile_request_yields_shaped_response() {
    let gw = gateway(
        1,
        Some(json!([{"season": 33, "chapter": "4"}, {"season": 34, "chapter": "5"}])),
    )
    .await;
    gw.engine.route(PROFILE_URL, Step::Html(profile_page())).await;

    let shaped = gw
        .queue
        .submit(ScrapeTask::profile("player1", None))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(shaped.current_season, 34);
    assert_eq!(shaped.account_id, "acct-1");
    assert_eq!(shaped.epic_id.as_deref(), Some("player1"));

    // S34 aggregates both windows, S33 gets its own bucket
    assert_eq!(shaped.seasons_pr["S34"].point, 20.0);
    assert_eq!(shaped.seasons_pr["S34"].events.len(), 2);
    assert_eq!(shaped.seasons_pr["S33"].point, 5.0);
    assert_eq!(
        shaped.seasons_pr["S34"].events[0].event_name,
        "epicgames_S34_FNCS_week1"
    );

    // Seasonal metadata came from the cache file
    assert_eq!(shaped.seasons_data.len(), 2);
    assert_eq!(shaped.seasons_data[1]["season"], 34);
}

#[tokio::test(start_paused = true)]
async fn misspelled_identifier_is_corrected_through_search() {
    let gw = gateway(1, None).await;
    gw.engine.route(PROFILE_URL, Step::Html(missing_page())).await;
    gw.engine
        .route(
            SEARCH_URL,
            Step::Html(
                r#"<html><body><div class="player-handle">Player_One</div></body></html>"#
                    .to_string(),
            ),
        )
        .await;
    gw.engine.route(CORRECTED_URL, Step::Html(profile_page())).await;

    let shaped = gw
        .queue
        .submit(ScrapeTask::profile("player1", None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shaped.account_id, "acct-1");

    assert_eq!(
        gw.engine.nav_log().await,
        vec![
            PROFILE_URL.to_string(),
            SEARCH_URL.to_string(),
            CORRECTED_URL.to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn challenge_interstitial_is_sat_out() {
    let gw = gateway(1, None).await;
    gw.engine
        .route(
            PROFILE_URL,
            Step::Challenge {
                interstitial: "<html><body>Verifying you are human…</body></html>".to_string(),
                then: profile_page(),
            },
        )
        .await;

    let shaped = gw
        .queue
        .submit(ScrapeTask::profile("player1", None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shaped.current_season, 34);
    // Seasonal lookup had nothing to serve; the profile ships anyway
    assert!(shaped.seasons_data.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_player_resolves_to_not_found() {
    let gw = gateway(1, None).await;
    gw.engine.route(PROFILE_URL, Step::Html(missing_page())).await;
    gw.engine.route(SEARCH_URL, Step::Html(missing_page())).await;

    let result = gw
        .queue
        .submit(ScrapeTask::profile("player1", None))
        .await
        .unwrap();
    assert!(matches!(result, Err(FetchError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_never_exceed_pool_capacity() {
    let gw = gateway(2, None).await;
    for i in 0..6 {
        gw.engine
            .route(
                format!("https://tracker.test/profile/p{i}"),
                Step::Html(profile_page()),
            )
            .await;
    }

    let receivers: Vec<_> = (0..6)
        .map(|i| gw.queue.submit(ScrapeTask::profile(format!("p{i}"), None)))
        .collect();
    for rx in receivers {
        rx.await.unwrap().unwrap();
    }

    assert!(gw.engine.peak_open_tabs() <= 2);
    assert_eq!(gw.queue.queued_count(), 0);
    assert_eq!(gw.pool.stats().await.in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn direct_url_task_works_without_correction() {
    let gw = gateway(1, None).await;
    gw.engine.route(PROFILE_URL, Step::Html(profile_page())).await;

    let shaped = gw
        .queue
        .submit(ScrapeTask::direct_url(PROFILE_URL))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shaped.account_id, "acct-1");
    assert_eq!(gw.engine.nav_log().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn browser_disconnect_does_not_poison_later_requests() {
    let gw = gateway(1, None).await;
    gw.pool.watch_engine();
    gw.engine.route(PROFILE_URL, Step::Html(profile_page())).await;

    // Warm the pool, then kill the browser connection
    let first = gw
        .queue
        .submit(ScrapeTask::profile("player1", None))
        .await
        .unwrap();
    assert!(first.is_ok());

    gw.engine.trigger_disconnect();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let second = gw
        .queue
        .submit(ScrapeTask::profile("player1", None))
        .await
        .unwrap();
    assert!(second.is_ok());
}
