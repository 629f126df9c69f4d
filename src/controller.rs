//! Owns the lifecycle of one scan at a time.
//!
//! `start` validates the root on the caller's thread, then hands the walk to a
//! background worker. The worker builds its own [`ClassIndex`] and publishes it
//! in one step when it finishes, so readers either see a complete index or
//! none. A generation counter makes results of a cancelled, still-running
//! worker land nowhere.
//!
//! ```text
//! Idle ──start──▶ Scanning ──done──▶ Completed
//!                    │ ├──cancel──▶ Cancelled
//!                    │ └──error───▶ Failed
//! Completed / Cancelled / Failed ──start──▶ Scanning
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::index::ClassIndex;
use crate::query::{QueryEngine, QueryMode};
use crate::walker::{CancelToken, ScanReport, TreeWalker, open_root};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone)]
pub enum ScanEvent {
    Completed(ScanReport),
    Cancelled,
    Failed(String),
}

impl ScanEvent {
    pub fn state(&self) -> ScanState {
        match self {
            Self::Completed(_) => ScanState::Completed,
            Self::Cancelled => ScanState::Cancelled,
            Self::Failed(_) => ScanState::Failed,
        }
    }
}

type Listener = Arc<dyn Fn(&ScanEvent) + Send + Sync>;

struct Inner {
    state: ScanState,
    generation: u64,
    cancel: CancelToken,
    index: Option<Arc<ClassIndex>>,
    report: Option<ScanReport>,
    failure: Option<String>,
    /// Handles of every worker that may still be running, superseded ones included.
    workers: Vec<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    changed: Condvar,
    listeners: Mutex<Vec<Listener>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: &ScanEvent) {
        self.changed.notify_all();
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(event);
        }
    }

    /// Publishes a worker's outcome unless the scan it belongs to was
    /// cancelled or superseded in the meantime.
    fn finish(&self, generation: u64, outcome: Result<(ClassIndex, ScanReport)>) {
        let event = {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != ScanState::Scanning {
                return;
            }
            match outcome {
                Ok((index, report)) => {
                    inner.state = ScanState::Completed;
                    inner.index = Some(Arc::new(index));
                    inner.report = Some(report.clone());
                    ScanEvent::Completed(report)
                }
                Err(ScanError::Cancelled) => {
                    inner.state = ScanState::Cancelled;
                    inner.index = None;
                    ScanEvent::Cancelled
                }
                Err(err) => {
                    let detail = err.detail();
                    warn!(error = %detail, "Scan failed");
                    inner.state = ScanState::Failed;
                    inner.index = None;
                    inner.failure = Some(detail.clone());
                    ScanEvent::Failed(detail)
                }
            }
        };
        self.notify(&event);
    }
}

pub struct ScanController {
    config: ScanConfig,
    shared: Arc<Shared>,
    queries: Mutex<QueryEngine>,
}

impl ScanController {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ScanState::Idle,
                    generation: 0,
                    cancel: CancelToken::new(),
                    index: None,
                    report: None,
                    failure: None,
                    workers: Vec::new(),
                }),
                changed: Condvar::new(),
                listeners: Mutex::new(Vec::new()),
            }),
            queries: Mutex::new(QueryEngine::new()),
        }
    }

    /// Registers a listener called on every transition out of `Scanning`.
    /// Listeners may run on the worker thread.
    pub fn on_state_changed<F>(&self, listener: F)
    where
        F: Fn(&ScanEvent) + Send + Sync + 'static,
    {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Discards any previous results and starts scanning `root` in the
    /// background. An inaccessible root fails here, before any worker starts.
    pub fn start(&self, root: impl AsRef<Path>) -> Result<()> {
        let opened = open_root(root.as_ref());
        let cancel = CancelToken::new();
        let generation = {
            let mut inner = self.shared.lock();
            if inner.state == ScanState::Scanning {
                return Err(ScanError::AlreadyScanning);
            }
            inner.generation += 1;
            inner.cancel = cancel.clone();
            inner.index = None;
            inner.report = None;
            inner.failure = opened.as_ref().err().map(ScanError::detail);
            inner.state = if opened.is_ok() {
                ScanState::Scanning
            } else {
                ScanState::Failed
            };
            inner.generation
        };
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();

        let root = match opened {
            Ok(root) => root,
            Err(err) => {
                let detail = err.detail();
                warn!(error = %detail, "Scan failed");
                self.shared.notify(&ScanEvent::Failed(detail));
                return Err(err);
            }
        };

        info!(root = %root.display(), generation, "Starting scan");
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let worker = std::thread::spawn(move || {
            let outcome = TreeWalker::new(config).walk(&root, &cancel);
            shared.finish(generation, outcome);
        });

        let mut inner = self.shared.lock();
        inner.workers.retain(|handle| !handle.is_finished());
        inner.workers.push(worker);
        Ok(())
    }

    /// Stops the running scan and drops its partial index. No-op otherwise.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        if inner.state != ScanState::Scanning {
            return;
        }
        inner.cancel.cancel();
        inner.state = ScanState::Cancelled;
        inner.index = None;
        drop(inner);

        info!("Scan cancel requested");
        self.shared.notify(&ScanEvent::Cancelled);
    }

    pub fn state(&self) -> ScanState {
        self.shared.lock().state
    }

    /// Blocks until the current scan leaves `Scanning`.
    pub fn wait(&self) -> ScanState {
        let mut inner = self.shared.lock();
        while inner.state == ScanState::Scanning {
            inner = self
                .shared
                .changed
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        inner.state
    }

    /// The finished index, only once the last scan completed.
    pub fn index(&self) -> Option<Arc<ClassIndex>> {
        let inner = self.shared.lock();
        match inner.state {
            ScanState::Completed => inner.index.clone(),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<ScanReport> {
        self.shared.lock().report.clone()
    }

    pub fn failure(&self) -> Option<String> {
        self.shared.lock().failure.clone()
    }

    pub fn query(&self, mode: &QueryMode) -> Result<Vec<String>> {
        let index = self.index().ok_or(ScanError::NotReady)?;
        let mut queries = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
        queries.run(&index, mode).map(<[String]>::to_vec)
    }

    /// Result of the last successful query.
    pub fn last_results(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .results()
            .to_vec()
    }

    pub fn archives_for(&self, class_name: &str) -> Vec<PathBuf> {
        self.index()
            .map(|index| index.lookup(class_name).to_vec())
            .unwrap_or_default()
    }

    /// Waits for every worker started so far, cancelled ones included.
    fn join_workers(&self) {
        let workers = std::mem::take(&mut self.shared.lock().workers);
        for handle in workers {
            let _ = handle.join();
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.shared.lock().cancel.cancel();
        self.join_workers();
    }
}
