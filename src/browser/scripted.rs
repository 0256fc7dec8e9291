//! Scripted in-memory browser driver
//!
//! Replays canned pages keyed by URL so the pool, queue and fetch protocol
//! can be exercised end to end without a Chrome process. Used throughout the
//! test suite; never constructed by the service binary.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::{BrowserEngine, EngineError, TabDriver};

/// What a scripted navigation to a URL produces.
///
/// Routes hold a queue of steps per URL; each navigation consumes the next
/// step, and the last step repeats once the queue is down to one.
#[derive(Debug, Clone)]
pub enum Step {
    /// Serve this HTML
    Html(String),
    /// Serve these documents to successive content reads without navigating
    /// (models a page that finishes rendering late)
    HtmlSeries(Vec<String>),
    /// Serve interstitial text now; the next navigation wait swaps in `then`
    Challenge { interstitial: String, then: String },
    /// Navigation fails with this message
    NavError(String),
    /// The tab dies mid-navigation
    Crash,
}

#[derive(Default)]
struct ScriptState {
    routes: HashMap<String, VecDeque<Step>>,
    nav_log: Vec<String>,
}

struct ScriptInner {
    state: Mutex<ScriptState>,
    open_tabs: AtomicUsize,
    peak_open: AtomicUsize,
    total_opened: AtomicUsize,
    disconnect_tx: watch::Sender<bool>,
    disconnect_rx: watch::Receiver<bool>,
}

/// Scripted engine handle. Cloning shares the underlying script, so a test
/// can keep a handle for assertions after giving one to the pool.
#[derive(Clone)]
pub struct ScriptedEngine {
    inner: Arc<ScriptInner>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        let (disconnect_tx, disconnect_rx) = watch::channel(false);
        Self {
            inner: Arc::new(ScriptInner {
                state: Mutex::new(ScriptState::default()),
                open_tabs: AtomicUsize::new(0),
                peak_open: AtomicUsize::new(0),
                total_opened: AtomicUsize::new(0),
                disconnect_tx,
                disconnect_rx,
            }),
        }
    }

    /// Queue a step for a URL.
    pub async fn route(&self, url: impl Into<String>, step: Step) {
        let mut state = self.inner.state.lock().await;
        state.routes.entry(url.into()).or_default().push_back(step);
    }

    /// Simulate losing the browser connection.
    pub fn trigger_disconnect(&self) {
        let _ = self.inner.disconnect_tx.send(true);
    }

    /// URLs navigated to, in order.
    pub async fn nav_log(&self) -> Vec<String> {
        self.inner.state.lock().await.nav_log.clone()
    }

    /// Tabs currently open.
    pub fn open_tabs(&self) -> usize {
        self.inner.open_tabs.load(Ordering::SeqCst)
    }

    /// Highest number of tabs ever open at once.
    pub fn peak_open_tabs(&self) -> usize {
        self.inner.peak_open.load(Ordering::SeqCst)
    }

    /// Tabs opened over the engine's lifetime.
    pub fn total_opened(&self) -> usize {
        self.inner.total_opened.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserEngine for ScriptedEngine {
    async fn open_tab(&self) -> Result<Box<dyn TabDriver>, EngineError> {
        let open = self.inner.open_tabs.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_open.fetch_max(open, Ordering::SeqCst);
        self.inner.total_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedTab {
            inner: self.inner.clone(),
            doc: Mutex::new(TabDoc::default()),
            open: AtomicBool::new(true),
        }))
    }

    async fn disconnected(&self) {
        let mut rx = self.inner.disconnect_rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Default)]
struct TabDoc {
    /// Successive documents served to content reads; the last one repeats
    reads: VecDeque<String>,
    /// Document swapped in when a navigation wait resolves
    pending_nav: Option<String>,
    url: Option<String>,
}

struct ScriptedTab {
    inner: Arc<ScriptInner>,
    doc: Mutex<TabDoc>,
    open: AtomicBool,
}

impl ScriptedTab {
    fn mark_dead(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.inner.open_tabs.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl TabDriver for ScriptedTab {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(EngineError::TabGone);
        }

        let step = {
            let mut state = self.inner.state.lock().await;
            state.nav_log.push(url.to_string());
            let queue = state
                .routes
                .get_mut(url)
                .ok_or_else(|| EngineError::Navigation(format!("no script for URL {url}")))?;
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue
                    .front()
                    .cloned()
                    .ok_or_else(|| EngineError::Navigation(format!("no script for URL {url}")))?
            }
        };

        let mut doc = self.doc.lock().await;
        doc.url = Some(url.to_string());
        doc.pending_nav = None;
        match step {
            Step::Html(html) => {
                doc.reads = VecDeque::from(vec![html]);
                Ok(())
            }
            Step::HtmlSeries(series) => {
                doc.reads = series.into();
                Ok(())
            }
            Step::Challenge { interstitial, then } => {
                doc.reads = VecDeque::from(vec![interstitial]);
                doc.pending_nav = Some(then);
                Ok(())
            }
            Step::NavError(msg) => Err(EngineError::Navigation(msg)),
            Step::Crash => {
                self.mark_dead();
                Err(EngineError::TabGone)
            }
        }
    }

    async fn wait_for_navigation(&self) -> Result<(), EngineError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(EngineError::TabGone);
        }
        let pending = self.doc.lock().await.pending_nav.take();
        match pending {
            Some(then) => {
                self.doc.lock().await.reads = VecDeque::from(vec![then]);
                Ok(())
            }
            // No navigation will ever happen; the caller's timeout decides
            None => futures::future::pending().await,
        }
    }

    async fn content(&self) -> Result<String, EngineError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(EngineError::TabGone);
        }
        let mut doc = self.doc.lock().await;
        if doc.reads.len() > 1 {
            Ok(doc.reads.pop_front().unwrap())
        } else {
            doc.reads
                .front()
                .cloned()
                .ok_or_else(|| EngineError::Content("no document".to_string()))
        }
    }

    async fn inner_text(&self) -> Result<String, EngineError> {
        // Phrase matching downstream is substring-based, so serving the raw
        // markup as "text" is close enough for a scripted page.
        self.content().await
    }

    async fn current_url(&self) -> Option<String> {
        if !self.open.load(Ordering::SeqCst) {
            return None;
        }
        self.doc.lock().await.url.clone()
    }

    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(self: Box<Self>) {
        self.mark_dead();
    }
}
