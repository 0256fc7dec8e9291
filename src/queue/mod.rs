//! Admission control for scrape tasks
//!
//! An ordered queue drained by a fixed set of workers, one per pool slot,
//! so no more fetches run concurrently than the tab pool can serve. Tasks
//! start in submission order; a failure is answered to its submitter and
//! logged, never allowed to take a worker down; work submitted while the
//! workers are busy just extends the queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error};

use crate::scrape::FetchError;
use crate::types::ShapedResponse;

/// A pending scrape request
#[derive(Debug, Clone)]
pub struct ScrapeTask {
    pub kind: TaskKind,
    pub submitted_at: Instant,
}

/// What the task asks the fetcher to do
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Look up a player by identifier, with an optional correction hint for
    /// the search fallback
    Profile {
        identifier: String,
        correction_hint: Option<String>,
    },
    /// Legacy variant: fetch a caller-supplied profile URL directly
    DirectUrl { url: String },
}

impl ScrapeTask {
    pub fn profile(identifier: impl Into<String>, correction_hint: Option<String>) -> Self {
        Self {
            kind: TaskKind::Profile {
                identifier: identifier.into(),
                correction_hint,
            },
            submitted_at: Instant::now(),
        }
    }

    pub fn direct_url(url: impl Into<String>) -> Self {
        Self {
            kind: TaskKind::DirectUrl { url: url.into() },
            submitted_at: Instant::now(),
        }
    }
}

/// Outcome delivered back to the submitter
pub type TaskResult = Result<ShapedResponse, FetchError>;

/// Executes one scrape task. Implemented by the profile fetcher; tests plug
/// in stubs.
#[async_trait]
pub trait TaskRunner: Send + Sync + 'static {
    async fn run(&self, task: ScrapeTask) -> TaskResult;
}

struct Job {
    task: ScrapeTask,
    reply: oneshot::Sender<TaskResult>,
}

/// Bounded-concurrency task queue
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Job>,
    active: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

impl TaskQueue {
    /// Start `workers` drain workers against the given runner.
    pub fn start(runner: Arc<dyn TaskRunner>, workers: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let active = Arc::new(AtomicUsize::new(0));
        let queued = Arc::new(AtomicUsize::new(0));

        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let runner = Arc::clone(&runner);
            let active = Arc::clone(&active);
            let queued = Arc::clone(&queued);
            tokio::spawn(async move {
                loop {
                    // Workers take turns waiting on the queue, which keeps
                    // dequeue order equal to submission order
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        debug!(worker = worker_id, "Task queue closed, worker exiting");
                        break;
                    };
                    queued.fetch_sub(1, Ordering::SeqCst);

                    active.fetch_add(1, Ordering::SeqCst);
                    let waited = job.task.submitted_at.elapsed();
                    debug!(worker = worker_id, waited_ms = waited.as_millis() as u64, "Starting scrape task");
                    let result = runner.run(job.task).await;
                    active.fetch_sub(1, Ordering::SeqCst);

                    if let Err(e) = &result {
                        error!(worker = worker_id, "Scrape task failed: {}", e);
                    }
                    // Submitter may have hung up; nothing to do about it
                    let _ = job.reply.send(result);
                }
            });
        }

        Arc::new(Self { tx, active, queued })
    }

    /// Append a task; the returned channel resolves with its outcome.
    pub fn submit(&self, task: ScrapeTask) -> oneshot::Receiver<TaskResult> {
        let (reply, rx) = oneshot::channel();
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Job { task, reply }).is_err() {
            // Workers are gone (shutdown); dropping `reply` errors the rx
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }
        rx
    }

    /// Tasks currently being executed.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Tasks waiting for a worker.
    pub fn queued_count(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}
