//! Challenge-aware profile scraping
//!
//! The fetch protocol lives here: navigate a pooled tab to the profile
//! page, sit out the anti-bot interstitial when one appears, pull the
//! embedded payload out of the rendered markup, fall back to the search
//! page to correct a misspelled identifier, and retry the whole protocol a
//! bounded number of times. `shaper` turns the raw payload into the stable
//! API shape.

mod challenge;
mod extract;
mod fetcher;
pub mod shaper;

pub use challenge::ChallengeDetector;
pub use extract::{PayloadError, PayloadExtractor};
pub use fetcher::{FetchError, ProfileFetcher};
