//! Anti-bot interstitial detection
//!
//! The target site fronts profile pages with a verification interstitial.
//! We only react to known phrasings; the list is configuration because it
//! varies with site locale and changes over time.

/// Matches rendered page text against the known interstitial phrases.
pub struct ChallengeDetector {
    /// Lowercased phrases
    phrases: Vec<String>,
}

impl ChallengeDetector {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Returns the first phrase found in the text, if any.
    pub fn detect<'a>(&'a self, text: &str) -> Option<&'a str> {
        let haystack = text.to_lowercase();
        self.phrases
            .iter()
            .find(|p| haystack.contains(p.as_str()))
            .map(String::as_str)
    }
}
