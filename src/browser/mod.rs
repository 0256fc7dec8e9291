//! Browser engine seam
//!
//! The automated browser is an external collaborator; the rest of the
//! gateway only ever sees the narrow capability defined here: open a tab,
//! navigate it, read what it rendered, close it. The `chromium` adapter
//! drives a real Chrome process over CDP; the `scripted` adapter replays
//! canned pages for the test suite.

pub mod chromium;
pub mod scripted;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a browser engine or one of its tabs
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Failed to open tab: {0}")]
    OpenTab(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Failed to read page content: {0}")]
    Content(String),
    #[error("Tab crashed or was closed")]
    TabGone,
}

/// A single browsing context.
///
/// Implementations are owned exclusively by one in-flight task at a time;
/// the pool enforces that, not the driver.
#[async_trait]
pub trait TabDriver: Send + Sync {
    /// Navigate and wait for DOM content to load.
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;

    /// Resolve on the next navigation event (URL change). Used to observe an
    /// interstitial clearing; callers bound this with their own timeout.
    async fn wait_for_navigation(&self) -> Result<(), EngineError>;

    /// Rendered HTML of the current document.
    async fn content(&self) -> Result<String, EngineError>;

    /// Rendered body text of the current document.
    async fn inner_text(&self) -> Result<String, EngineError>;

    /// Current URL, if the tab still has a document.
    async fn current_url(&self) -> Option<String>;

    /// Whether the underlying browsing context is still alive.
    async fn is_open(&self) -> bool;

    /// Close the tab. Best-effort; errors are swallowed.
    async fn close(self: Box<Self>);
}

/// The process-wide browser session.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh tab.
    async fn open_tab(&self) -> Result<Box<dyn TabDriver>, EngineError>;

    /// Resolve when the underlying browser connection is lost. The pool
    /// watches this to invalidate every tab it knows about.
    async fn disconnected(&self);
}
