//! Chromium adapter for the browser engine seam
//!
//! Launches one Chrome process at startup over CDP via chromiumoxide. Tabs
//! are lightweight pages inside that process. The CDP event handler runs in
//! a background task; when its stream ends the connection is gone, which is
//! the disconnect signal the pool listens for.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config;

use super::{BrowserEngine, EngineError, TabDriver};

/// Shared Chrome session, one per process.
pub struct ChromiumEngine {
    browser: Browser,
    user_agent: String,
    disconnect_rx: watch::Receiver<bool>,
}

impl ChromiumEngine {
    /// Launch the browser process and start its CDP handler loop.
    pub async fn launch(config: &config::BrowserConfig) -> Result<Self, EngineError> {
        let mut builder = BrowserConfig::builder();

        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        // Hide the obvious automation tells; the interstitial handling in the
        // fetcher deals with whatever still gets through.
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg("--no-first-run")
            .arg(format!("--user-agent={}", config.user_agent));

        for arg in &config.launch_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| EngineError::Launch(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        info!("Browser process launched");

        let (disconnect_tx, disconnect_rx) = watch::channel(false);

        // CDP event pump. The stream ending means the websocket to the
        // browser is gone, and every open tab with it.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
            let _ = disconnect_tx.send(true);
        });

        Ok(Self {
            browser,
            user_agent: config.user_agent.clone(),
            disconnect_rx,
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_tab(&self) -> Result<Box<dyn TabDriver>, EngineError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| EngineError::OpenTab(e.to_string()))?;

        page.set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(|e| EngineError::OpenTab(format!("user agent override: {e}")))?;

        Ok(Box::new(ChromiumTab { page }))
    }

    async fn disconnected(&self) {
        let mut rx = self.disconnect_rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped, which only happens when the handler exited
                return;
            }
        }
    }
}

/// One Chrome page driven over CDP
struct ChromiumTab {
    page: Page,
}

#[async_trait]
impl TabDriver for ChromiumTab {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), EngineError> {
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn content(&self) -> Result<String, EngineError> {
        self.page
            .content()
            .await
            .map_err(|e| EngineError::Content(e.to_string()))
    }

    async fn inner_text(&self) -> Result<String, EngineError> {
        let result = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| EngineError::Content(e.to_string()))?;
        result
            .into_value::<String>()
            .map_err(|e| EngineError::Content(e.to_string()))
    }

    async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn is_open(&self) -> bool {
        // Any round-trip to the target fails once the page is crashed,
        // detached or closed.
        self.page.url().await.is_ok()
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.page.close().await {
            debug!("Failed to close tab: {}", e);
        }
    }
}
