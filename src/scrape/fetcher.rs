//! The fetch/retry protocol
//!
//! Three-stage sequence per attempt: direct profile fetch, search-based
//! identifier correction on a miss, one retry against the corrected
//! identifier. The whole protocol is retried a bounded number of times on
//! unexpected failures. Every attempt borrows exactly one tab from the pool
//! and hands it back exactly once, on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::EngineError;
use crate::config::{FetchConfig, MissingHintPolicy};
use crate::pool::{PoolError, PooledTab, SessionPool};
use crate::queue::{ScrapeTask, TaskKind, TaskResult, TaskRunner};
use crate::seasons::SeasonService;
use crate::types::RawProfile;

use super::shaper;
use super::{ChallengeDetector, PayloadExtractor};

/// Errors surfaced by a profile fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// Definitive: neither the direct page nor the corrected identifier
    /// found a profile. This is a result, not a failure.
    #[error("no profile exists for this player")]
    NotFound,
    #[error("tab pool exhausted: {0}")]
    PoolExhausted(String),
    #[error("invalid URL built from template: {0}")]
    InvalidUrl(String),
    #[error("invalid fetch configuration: {0}")]
    Config(String),
    #[error("browser error: {0}")]
    Engine(#[from] EngineError),
    #[error("fetch failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// What one page load produced
enum PageResult {
    Profile(RawProfile),
    /// The not-found marker was on the page, or the payload never parsed
    Miss,
}

/// What one full protocol attempt produced
enum Outcome {
    Profile(RawProfile),
    NotFound,
}

/// What the fetcher is being pointed at
enum Target<'a> {
    Identifier {
        identifier: &'a str,
        hint: Option<&'a str>,
    },
    Url(&'a str),
}

/// Challenge-aware profile fetcher
pub struct ProfileFetcher {
    pool: Arc<SessionPool>,
    config: FetchConfig,
    extractor: PayloadExtractor,
    challenge: ChallengeDetector,
    result_selector: Selector,
    seasons: Arc<SeasonService>,
}

impl ProfileFetcher {
    pub fn new(
        pool: Arc<SessionPool>,
        config: FetchConfig,
        seasons: Arc<SeasonService>,
    ) -> Result<Self, FetchError> {
        let result_selector = Selector::parse(&config.search_result_selector)
            .map_err(|e| FetchError::Config(format!("bad search result selector: {e}")))?;
        let challenge = ChallengeDetector::new(&config.challenge_phrases);
        Ok(Self {
            pool,
            config,
            extractor: PayloadExtractor::new(),
            challenge,
            result_selector,
            seasons,
        })
    }

    /// Fetch a profile by player identifier, with the search-correction
    /// fallback on a miss.
    pub async fn fetch_profile(
        &self,
        identifier: &str,
        hint: Option<&str>,
    ) -> Result<RawProfile, FetchError> {
        self.run_protocol(Target::Identifier { identifier, hint })
            .await
    }

    /// Legacy variant: fetch a caller-supplied profile URL directly. No
    /// search correction; a miss is a definitive not-found.
    pub async fn fetch_url(&self, url: &str) -> Result<RawProfile, FetchError> {
        self.run_protocol(Target::Url(url)).await
    }

    /// The outer retry envelope. Each attempt borrows one tab; dead tabs
    /// are discarded instead of released so the pool never re-issues them.
    async fn run_protocol(&self, target: Target<'_>) -> Result<RawProfile, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_retries {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }

            let tab = match self.pool.acquire().await {
                Ok(tab) => tab,
                Err(PoolError::Exhausted(waited)) => {
                    return Err(FetchError::PoolExhausted(format!(
                        "no tab became available within {waited:?}"
                    )));
                }
                Err(e) => {
                    warn!(attempt, "Could not get a tab: {}", e);
                    last_error = e.to_string();
                    continue;
                }
            };

            let result = match &target {
                Target::Identifier { identifier, hint } => {
                    self.attempt_profile(&tab, identifier, *hint).await
                }
                Target::Url(url) => self.load_profile_page(&tab, url).await.map(|r| match r {
                    PageResult::Profile(raw) => Outcome::Profile(raw),
                    PageResult::Miss => Outcome::NotFound,
                }),
            };

            match result {
                Ok(Outcome::Profile(raw)) => {
                    self.pool.release(tab).await;
                    return Ok(raw);
                }
                Ok(Outcome::NotFound) => {
                    self.pool.release(tab).await;
                    return Err(FetchError::NotFound);
                }
                Err(e) => {
                    let tab_dead = matches!(&e, FetchError::Engine(EngineError::TabGone))
                        || !tab.driver().is_open().await;
                    if tab_dead {
                        self.pool.discard(tab).await;
                    } else {
                        self.pool.release(tab).await;
                    }
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        "Fetch attempt failed: {}",
                        e
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.config.max_retries,
            last_error,
        })
    }

    /// One full attempt: direct fetch, then search correction on a miss.
    async fn attempt_profile(
        &self,
        tab: &PooledTab,
        identifier: &str,
        hint: Option<&str>,
    ) -> Result<Outcome, FetchError> {
        let url = self.build_url(&self.config.profile_url_template, identifier)?;
        if let PageResult::Profile(raw) = self.load_profile_page(tab, url.as_str()).await? {
            return Ok(Outcome::Profile(raw));
        }

        // Miss. Look the identifier up on the search page to correct it.
        let query = match hint {
            Some(h) => h,
            None => match self.config.missing_hint_policy {
                MissingHintPolicy::FallBackToIdentifier => identifier,
                MissingHintPolicy::Fail => {
                    debug!(identifier, "No correction hint and policy is fail; not searching");
                    return Ok(Outcome::NotFound);
                }
            },
        };

        let search_url = self.build_url(&self.config.search_url_template, query)?;
        self.navigate_settled(tab, search_url.as_str()).await?;
        let html = tab.driver().content().await?;
        if html.contains(&self.config.not_found_marker) {
            return Ok(Outcome::NotFound);
        }

        let Some(corrected) = select_text(&html, &self.result_selector) else {
            debug!(identifier, "Search page has no result element; treating as not found");
            return Ok(Outcome::NotFound);
        };
        info!(from = identifier, to = %corrected, "Corrected identifier via search");

        let corrected_url = self.build_url(&self.config.profile_url_template, &corrected)?;
        match self.load_profile_page(tab, corrected_url.as_str()).await? {
            PageResult::Profile(raw) => Ok(Outcome::Profile(raw)),
            PageResult::Miss => Ok(Outcome::NotFound),
        }
    }

    /// Navigate to a profile URL and try to pull the payload out, with
    /// bounded re-reads for pages that finish rendering late.
    async fn load_profile_page(&self, tab: &PooledTab, url: &str) -> Result<PageResult, FetchError> {
        self.navigate_settled(tab, url).await?;

        let mut reads = 0;
        loop {
            let html = tab.driver().content().await?;
            if html.contains(&self.config.not_found_marker) {
                debug!(url, "Page carries the not-found marker");
                return Ok(PageResult::Miss);
            }
            match self.extractor.extract(&html) {
                Ok(raw) => return Ok(PageResult::Profile(raw)),
                Err(e) if reads < self.config.parse_retries => {
                    reads += 1;
                    debug!(
                        url,
                        read = reads,
                        max = self.config.parse_retries,
                        "Payload not extractable yet ({}), re-reading",
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.parse_retry_delay_ms))
                        .await;
                }
                Err(e) => {
                    warn!(url, "Giving up on payload extraction: {}", e);
                    return Ok(PageResult::Miss);
                }
            }
        }
    }

    /// Navigate with a timeout, sit out a challenge interstitial if one is
    /// on screen, and let the page settle.
    async fn navigate_settled(&self, tab: &PooledTab, url: &str) -> Result<(), FetchError> {
        let nav_timeout = Duration::from_secs(self.config.navigation_timeout_secs);
        timeout(nav_timeout, tab.driver().navigate(url))
            .await
            .map_err(|_| {
                EngineError::Navigation(format!("navigation to {url} timed out after {nav_timeout:?}"))
            })??;

        let text = tab.driver().inner_text().await?;
        if let Some(phrase) = self.challenge.detect(&text) {
            info!(url, phrase, "Challenge interstitial detected, waiting it out");
            let challenge_timeout = Duration::from_secs(self.config.challenge_timeout_secs);
            match timeout(challenge_timeout, tab.driver().wait_for_navigation()).await {
                Ok(Ok(())) => debug!(url, "Challenge cleared"),
                Ok(Err(e)) => return Err(e.into()),
                // Soft failure: the challenge may have resolved without a
                // navigation we can observe, so keep going
                Err(_) => warn!(
                    url,
                    "No navigation within {:?} after challenge; proceeding anyway", challenge_timeout
                ),
            }
        }

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        Ok(())
    }

    fn build_url(&self, template: &str, identifier: &str) -> Result<Url, FetchError> {
        let raw = template.replace("{id}", identifier);
        Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))
    }
}

/// First non-empty text of the elements matching `selector`.
fn select_text(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

#[async_trait]
impl TaskRunner for ProfileFetcher {
    async fn run(&self, task: ScrapeTask) -> TaskResult {
        let raw = match &task.kind {
            TaskKind::Profile {
                identifier,
                correction_hint,
            } => {
                self.fetch_profile(identifier, correction_hint.as_deref())
                    .await?
            }
            TaskKind::DirectUrl { url } => self.fetch_url(url).await?,
        };
        let seasons_data = self.seasons.seasons_for(raw.current_season).await;
        Ok(shaper::transform(&raw, seasons_data))
    }
}
