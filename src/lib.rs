//! Rankgate: challenge-aware scraping gateway for competitive player profiles
//!
//! A request-driven HTTP service that scrapes a tracker site's player
//! profile pages with a pool of reusable headless-browser tabs, featuring:
//! - One shared Chrome process over CDP (chromiumoxide), tabs pooled and
//!   recycled across requests
//! - Anti-bot interstitial detection with a bounded wait-it-out protocol
//! - Search-based identifier correction when the direct profile URL misses
//! - Extraction of the profile payload embedded in the rendered markup
//! - Per-season point aggregation into a stable response shape
//! - Seasonal metadata enrichment behind a read-through cache

pub mod browser;
pub mod config;
pub mod http;
pub mod pool;
pub mod queue;
pub mod scrape;
pub mod seasons;
pub mod types;

pub use config::Config;
pub use types::*;
