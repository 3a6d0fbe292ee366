//! Job lifecycle on a dedicated worker thread.
//!
//! [`DownloadController`] owns at most one running job. Starting a job spawns
//! a worker thread that runs a [`DownloadEngine`]; stopping it trips the job's
//! cancellation token; shutting down cancels and joins.
//!
//! ```text
//!  caller thread                      worker thread
//!  ─────────────                      ─────────────
//!  start(job) ──claim dir, spawn──►   engine.run(job, token)
//!  stop()     ──token.cancel()──►       ├─ polls token per tile / chunk
//!  progress() ◄──atomics──────────      ├─ reporter events
//!                                       └─ release claim, then finished()
//!  wait()     ◄──join──────────────
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::DownloaderConfig;
use super::engine::DownloadEngine;
use super::error::ControllerError;
use super::job::DownloadJob;
use super::progress::{ProgressCounters, ProgressReporter, ProgressSnapshot};
use super::state::JobReport;
use crate::logging::LogSink;
use crate::store::StoreConnector;

// =============================================================================
// Directory registry
// =============================================================================

/// Directories with an active job, across every controller in the process.
static ACTIVE_DIRECTORIES: Mutex<BTreeSet<PathBuf>> =
    parking_lot::const_mutex(BTreeSet::new());

/// Exclusive use of a target directory. Released on drop.
struct DirectoryClaim {
    path: PathBuf,
    released: AtomicBool,
}

impl DirectoryClaim {
    fn acquire(directory: &Path) -> Result<Self, ControllerError> {
        let path = registry_key(directory);
        if !ACTIVE_DIRECTORIES.lock().insert(path.clone()) {
            return Err(ControllerError::DirectoryBusy(directory.to_path_buf()));
        }
        Ok(Self {
            path,
            released: AtomicBool::new(false),
        })
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            ACTIVE_DIRECTORIES.lock().remove(&self.path);
        }
    }
}

impl Drop for DirectoryClaim {
    fn drop(&mut self) {
        self.release();
    }
}

/// Registry key for a directory: canonical when it exists, as given otherwise.
fn registry_key(directory: &Path) -> PathBuf {
    directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf())
}

// =============================================================================
// Reporter wrapper
// =============================================================================

/// Frees the controller before passing the terminal report on, so the
/// consumer can start the next job from its `finished` handler.
struct ReleasingReporter {
    inner: Arc<dyn ProgressReporter>,
    busy: Arc<AtomicBool>,
    claim: DirectoryClaim,
    released: AtomicBool,
}

impl ReleasingReporter {
    fn new(
        inner: Arc<dyn ProgressReporter>,
        busy: Arc<AtomicBool>,
        claim: DirectoryClaim,
    ) -> Self {
        Self {
            inner,
            busy,
            claim,
            released: AtomicBool::new(false),
        }
    }

    /// Release once. A later job may already own the busy flag.
    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.claim.release();
            self.busy.store(false, Ordering::SeqCst);
        }
    }
}

impl ProgressReporter for ReleasingReporter {
    fn file_progress(&self, current: usize, total: usize) {
        self.inner.file_progress(current, total);
    }

    fn byte_progress(&self, downloaded: u64, total: u64) {
        self.inner.byte_progress(downloaded, total);
    }

    fn status(&self, message: &str) {
        self.inner.status(message);
    }

    fn error(&self, message: &str) {
        self.inner.error(message);
    }

    fn finished(&self, report: &JobReport) {
        self.release();
        self.inner.finished(report);
    }
}

impl Drop for ReleasingReporter {
    fn drop(&mut self) {
        // Covers a worker that never got as far as `finished`.
        self.release();
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Starts, stops, and joins download jobs, one at a time.
pub struct DownloadController {
    connector: Arc<dyn StoreConnector>,
    reporter: Arc<dyn ProgressReporter>,
    log_sink: LogSink,
    config: DownloaderConfig,
    busy: Arc<AtomicBool>,
    /// Token of the most recent job. Outlives the handle so `stop` still
    /// reaches a job that `wait` is joining.
    cancel: Mutex<Option<CancellationToken>>,
    current: Mutex<Option<JoinHandle<JobReport>>>,
    /// Workers replaced by a newer job before anyone joined them.
    retired: Mutex<Vec<JoinHandle<JobReport>>>,
    counters: Mutex<Arc<ProgressCounters>>,
}

impl DownloadController {
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        reporter: Arc<dyn ProgressReporter>,
        log_sink: LogSink,
    ) -> Self {
        Self {
            connector,
            reporter,
            log_sink,
            config: DownloaderConfig::default(),
            busy: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(None),
            current: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
            counters: Mutex::new(Arc::new(ProgressCounters::new())),
        }
    }

    pub fn with_config(mut self, config: DownloaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Start `job` on a new worker thread.
    ///
    /// Fails without side effects while another job of this controller is
    /// running, or while any job in the process targets the same directory.
    pub fn start(&self, job: DownloadJob) -> Result<(), ControllerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Rejected job: controller busy");
            return Err(ControllerError::JobInProgress);
        }

        let claim = match DirectoryClaim::acquire(job.directory()) {
            Ok(claim) => claim,
            Err(e) => {
                self.busy.store(false, Ordering::SeqCst);
                debug!(directory = %job.directory().display(), "Rejected job: directory busy");
                return Err(e);
            }
        };

        let reporter = Arc::new(ReleasingReporter::new(
            Arc::clone(&self.reporter),
            Arc::clone(&self.busy),
            claim,
        ));
        let counters = Arc::new(ProgressCounters::new());
        *self.counters.lock() = Arc::clone(&counters);

        let engine = DownloadEngine::new(
            Arc::clone(&self.connector),
            reporter,
            self.log_sink.clone(),
        )
        .with_config(self.config.clone())
        .with_counters(counters);

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let tiles = job.len();

        // On spawn failure the closure is dropped, which drops the reporter
        // and releases the claim and busy flag.
        let handle = thread::Builder::new()
            .name("demtiles-download".to_string())
            .spawn(move || engine.run(&job, &worker_cancel))
            .map_err(ControllerError::Spawn)?;

        *self.cancel.lock() = Some(cancel);
        if let Some(previous) = self.current.lock().replace(handle) {
            self.retired.lock().push(previous);
        }

        info!(tiles, "Download job submitted");
        Ok(())
    }

    /// Ask the running job to stop. Returns immediately.
    pub fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().as_ref() {
            if !cancel.is_cancelled() {
                info!("Stop requested");
                cancel.cancel();
            }
        }
    }

    /// Whether a job is active.
    ///
    /// Turns false just before the job's `finished` notification.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Progress of the current (or most recent) job.
    pub fn progress(&self) -> ProgressSnapshot {
        self.counters.lock().snapshot()
    }

    /// Block until every worker of this controller has exited.
    ///
    /// Returns the report of the most recent job, if one had not been
    /// collected yet. Must not be called from a reporter callback.
    pub fn wait(&self) -> Option<JobReport> {
        let retired = std::mem::take(&mut *self.retired.lock());
        for handle in retired {
            join_worker(handle);
        }

        let handle = self.current.lock().take()?;
        if handle.thread().id() == thread::current().id() {
            warn!("wait() called from the download worker; not joining");
            *self.current.lock() = Some(handle);
            return None;
        }
        join_worker(handle)
    }

    /// Cancel the running job and wait for every worker to exit.
    pub fn shutdown(&self) {
        self.stop();
        self.wait();
    }
}

impl Drop for DownloadController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join_worker(handle: JoinHandle<JobReport>) -> Option<JobReport> {
    match handle.join() {
        Ok(report) => Some(report),
        Err(_) => {
            warn!("Download worker panicked");
            None
        }
    }
}
