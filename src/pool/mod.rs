//! Bounded pool of browser tabs
//!
//! Hands out one tab per in-flight task, lazily creating tabs up to the
//! configured capacity. Past capacity, callers park as FIFO waiters until a
//! tab is released or recreated. Free tabs are closed after an idle window;
//! dead tabs (crash, unexpected close, runtime error) are discarded and
//! never handed out again. A browser-wide disconnect invalidates everything
//! and resolves pending waiters with freshly created tabs.
//!
//! All bookkeeping lives behind one mutex; the pool is the only authority
//! that moves a tab between free, in-use and closed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::browser::{BrowserEngine, EngineError, TabDriver};
use crate::config::PoolConfig;

/// Errors surfaced by pool operations
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("No tab became available within {0:?}")]
    Exhausted(Duration),
    #[error("Browser engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Pool was invalidated while waiting")]
    Invalidated,
}

/// A tab on loan from the pool.
///
/// The holder owns it exclusively until handing it back through
/// [`SessionPool::release`] or [`SessionPool::discard`].
pub struct PooledTab {
    pub id: Uuid,
    driver: Box<dyn TabDriver>,
    generation: u64,
}

impl PooledTab {
    pub fn driver(&self) -> &dyn TabDriver {
        self.driver.as_ref()
    }
}

impl std::fmt::Debug for PooledTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTab")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

struct FreeTab {
    id: Uuid,
    driver: Box<dyn TabDriver>,
    /// Bumped every time the tab re-enters the free set, so a stale idle
    /// reaper from an earlier stint cannot close it
    idle_epoch: u64,
}

struct PoolState {
    /// Tabs in existence this generation (free + in-use)
    total: usize,
    free: Vec<FreeTab>,
    in_use: usize,
    waiters: VecDeque<oneshot::Sender<PooledTab>>,
    /// Bumped on invalidate_all; loans from older generations are closed on
    /// return instead of re-entering the pool
    generation: u64,
    next_epoch: u64,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub free: usize,
    pub in_use: usize,
    pub waiters: usize,
}

pub struct SessionPool {
    engine: Arc<dyn BrowserEngine>,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl SessionPool {
    pub fn new(engine: Arc<dyn BrowserEngine>, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            engine,
            config,
            state: Mutex::new(PoolState {
                total: 0,
                free: Vec::new(),
                in_use: 0,
                waiters: VecDeque::new(),
                generation: 0,
                next_epoch: 0,
            }),
        })
    }

    fn idle_window(&self) -> Duration {
        Duration::from_secs(self.config.idle_window_secs)
    }

    fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.config.acquire_timeout_secs)
    }

    /// Watch the engine for a total disconnect and invalidate on it.
    pub fn watch_engine(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            pool.engine.disconnected().await;
            warn!("Browser connection lost, invalidating tab pool");
            pool.invalidate_all().await;
        });
    }

    /// Get a tab: a free one, a newly created one below capacity, or block
    /// as a FIFO waiter until one is released. Waiting is bounded by the
    /// configured acquire timeout.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledTab, PoolError> {
        let mut rx = loop {
            let mut state = self.state.lock().await;

            // Free tabs first. The health check is a driver round-trip
            // that can stall on a wedged browser, so it runs without the
            // state lock; a tab that died while idle loops back in for
            // the next candidate.
            if let Some(free) = state.free.pop() {
                state.in_use += 1;
                let generation = state.generation;
                drop(state);

                if free.driver.is_open().await {
                    return Ok(PooledTab {
                        id: free.id,
                        driver: free.driver,
                        generation,
                    });
                }
                debug!(tab = %free.id, "Dropping tab that died while idle");
                let mut state = self.state.lock().await;
                if state.generation == generation {
                    state.in_use -= 1;
                    state.total -= 1;
                }
                drop(state);
                free.driver.close().await;
                continue;
            }

            if state.total < self.config.capacity {
                // Reserve the slot before releasing the lock so concurrent
                // acquires cannot overshoot capacity
                state.total += 1;
                let generation = state.generation;
                drop(state);

                match self.engine.open_tab().await {
                    Ok(driver) => {
                        let id = Uuid::new_v4();
                        let mut state = self.state.lock().await;
                        state.in_use += 1;
                        debug!(tab = %id, "Created tab ({}/{})", state.total, self.config.capacity);
                        return Ok(PooledTab {
                            id,
                            driver,
                            generation,
                        });
                    }
                    Err(e) => {
                        self.state.lock().await.total -= 1;
                        return Err(PoolError::Engine(e));
                    }
                }
            }

            // At capacity: park as a waiter
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            break rx;
        };

        match timeout(self.acquire_timeout(), &mut rx).await {
            Ok(Ok(tab)) => Ok(tab),
            Ok(Err(_)) => Err(PoolError::Invalidated),
            Err(_) => {
                // A release can hand the tab over in the instant between
                // the timeout elapsing and this receiver being dropped;
                // reclaim it or the slot is lost for good.
                self.reclaim_missed_handoff(rx).await;
                Err(PoolError::Exhausted(self.acquire_timeout()))
            }
        }
    }

    /// Recover a tab that was handed to a waiter whose acquire already
    /// timed out. Closing the receiver first makes any later send fail
    /// cleanly; a tab already in the channel goes back through release.
    async fn reclaim_missed_handoff(self: &Arc<Self>, mut rx: oneshot::Receiver<PooledTab>) {
        rx.close();
        if let Ok(tab) = rx.try_recv() {
            debug!(tab = %tab.id, "Reclaiming tab handed off after acquire timeout");
            self.release(tab).await;
        }
    }

    /// Hand a healthy tab back. The oldest live waiter gets it directly,
    /// bypassing the idle path; otherwise it enters the free set with an
    /// armed idle timer.
    pub async fn release(self: &Arc<Self>, tab: PooledTab) {
        let PooledTab {
            id,
            driver,
            generation,
        } = tab;

        let mut state = self.state.lock().await;
        if generation != state.generation {
            // Loan predates an invalidation; the tab is already written off
            drop(state);
            driver.close().await;
            return;
        }
        state.in_use -= 1;
        self.hand_off_or_park(&mut state, id, driver);
    }

    /// Drop a tab that hit a terminal condition (runtime error, crash,
    /// unexpected close). It never re-enters the pool; if a waiter is
    /// parked, a replacement is created for it in the background.
    pub async fn discard(self: &Arc<Self>, tab: PooledTab) {
        let PooledTab {
            id,
            driver,
            generation,
        } = tab;

        let spawn_replacement = {
            let mut state = self.state.lock().await;
            if generation != state.generation {
                drop(state);
                driver.close().await;
                return;
            }
            state.in_use -= 1;
            state.total -= 1;
            debug!(tab = %id, "Discarded tab ({}/{})", state.total, self.config.capacity);
            !state.waiters.is_empty() && state.total < self.config.capacity
        };

        driver.close().await;

        if spawn_replacement {
            let pool = Arc::clone(self);
            tokio::spawn(async move {
                pool.create_for_waiter().await;
            });
        }
    }

    /// Close every known tab, clear all bookkeeping and resolve every
    /// pending waiter with a freshly created replacement tab.
    pub async fn invalidate_all(self: &Arc<Self>) {
        let (free, waiters) = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.total = 0;
            state.in_use = 0;
            (
                std::mem::take(&mut state.free),
                std::mem::take(&mut state.waiters),
            )
        };

        info!(
            dropped = free.len(),
            waiters = waiters.len(),
            "Invalidating tab pool"
        );

        // Best-effort close; these tabs most likely died with the browser
        for tab in free {
            tab.driver.close().await;
        }

        for waiter in waiters {
            if waiter.is_closed() {
                continue;
            }
            let mut state = self.state.lock().await;
            if state.total >= self.config.capacity {
                // More waiters than capacity; the rest go back in the queue
                state.waiters.push_back(waiter);
                continue;
            }
            state.total += 1;
            let generation = state.generation;
            drop(state);

            match self.engine.open_tab().await {
                Ok(driver) => {
                    let id = Uuid::new_v4();
                    let tab = PooledTab {
                        id,
                        driver,
                        generation,
                    };
                    let mut state = self.state.lock().await;
                    match waiter.send(tab) {
                        Ok(()) => state.in_use += 1,
                        Err(tab) => {
                            // Waiter gave up in the meantime; keep the tab
                            self.hand_off_or_park(&mut state, tab.id, tab.driver);
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to recreate tab during invalidation: {}", e);
                    self.state.lock().await.total -= 1;
                    // Dropping the sender wakes the waiter with an error
                }
            }
        }
    }

    /// Current occupancy.
    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            capacity: self.config.capacity,
            free: state.free.len(),
            in_use: state.in_use,
            waiters: state.waiters.len(),
        }
    }

    /// Route a returned or fresh tab: oldest live waiter first, free set
    /// (with idle timer) otherwise. Caller holds the state lock.
    fn hand_off_or_park(self: &Arc<Self>, state: &mut PoolState, id: Uuid, driver: Box<dyn TabDriver>) {
        let mut tab = PooledTab {
            id,
            driver,
            generation: state.generation,
        };

        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(tab) {
                Ok(()) => {
                    state.in_use += 1;
                    return;
                }
                // Receiver timed out and went away; try the next waiter
                Err(returned) => tab = returned,
            }
        }

        state.next_epoch += 1;
        let idle_epoch = state.next_epoch;
        state.free.push(FreeTab {
            id: tab.id,
            driver: tab.driver,
            idle_epoch,
        });
        self.arm_idle_timer(tab.id, idle_epoch);
    }

    fn arm_idle_timer(self: &Arc<Self>, id: Uuid, idle_epoch: u64) {
        let pool = Arc::clone(self);
        let window = self.idle_window();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            pool.reap_idle(id, idle_epoch).await;
        });
    }

    /// Close a tab that sat in the free set for the whole idle window. The
    /// epoch check makes a timer from an earlier free stint a no-op.
    async fn reap_idle(self: &Arc<Self>, id: Uuid, idle_epoch: u64) {
        let driver = {
            let mut state = self.state.lock().await;
            let Some(pos) = state
                .free
                .iter()
                .position(|t| t.id == id && t.idle_epoch == idle_epoch)
            else {
                return;
            };
            let free = state.free.swap_remove(pos);
            state.total -= 1;
            debug!(tab = %id, "Closing idle tab ({}/{})", state.total, self.config.capacity);
            free.driver
        };
        driver.close().await;
    }

    /// Create a replacement tab for the oldest parked waiter after a
    /// discard. Runs outside the discard path so a failing engine cannot
    /// stall the discarding task.
    async fn create_for_waiter(self: &Arc<Self>) {
        let generation = {
            let mut state = self.state.lock().await;
            if state.waiters.is_empty() || state.total >= self.config.capacity {
                return;
            }
            state.total += 1;
            state.generation
        };

        match self.engine.open_tab().await {
            Ok(driver) => {
                let mut state = self.state.lock().await;
                if generation != state.generation {
                    state.total -= 1;
                    drop(state);
                    driver.close().await;
                    return;
                }
                self.hand_off_or_park(&mut state, Uuid::new_v4(), driver);
            }
            Err(e) => {
                warn!("Failed to create replacement tab: {}", e);
                self.state.lock().await.total -= 1;
            }
        }
    }
}
