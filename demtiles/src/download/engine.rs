//! The sequential download engine.
//!
//! One engine run processes one [`DownloadJob`] on the calling thread:
//!
//! 1. Connect to the store.
//! 2. Probe tile sizes to estimate the total ([`SizeProbe`]).
//! 3. Stream each tile in fixed-size chunks into a partial file, polling the
//!    cancellation token at the start of every tile and after every chunk.
//! 4. Report exactly one terminal [`JobReport`] through
//!    [`ProgressReporter::finished`].

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use super::config::DownloaderConfig;
use super::error::{CriticalError, TileFailure};
use super::job::DownloadJob;
use super::probe::{should_skip, ProbeOutcome, SizeProbe};
use super::progress::{EnginePhase, ProgressCounters, ProgressReporter};
use super::state::{DownloadState, JobReport, JobStatus, Outcome, SkipReason};
use crate::logging::LogSink;
use crate::store::{StoreConnector, StoreError, TileStore};
use crate::tile::TileCoordinate;

/// Runs download jobs against a tile store.
pub struct DownloadEngine {
    connector: Arc<dyn StoreConnector>,
    reporter: Arc<dyn ProgressReporter>,
    log_sink: LogSink,
    config: DownloaderConfig,
    counters: Arc<ProgressCounters>,
}

impl DownloadEngine {
    /// Create an engine that reports to `reporter` and logs to `log_sink`.
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
            counters: Arc::new(ProgressCounters::new()),
        }
    }

    pub fn with_config(mut self, config: DownloaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Share externally owned counters with this engine.
    pub fn with_counters(mut self, counters: Arc<ProgressCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn counters(&self) -> Arc<ProgressCounters> {
        Arc::clone(&self.counters)
    }

    /// Run a job to completion, cancellation, or critical failure.
    ///
    /// Blocks the calling thread. The reporter's `finished` is called exactly
    /// once before this returns, with the same report that is returned.
    pub fn run(&self, job: &DownloadJob, cancel: &CancellationToken) -> JobReport {
        self.log_sink.in_scope(|| {
            let span = info_span!(
                "download_job",
                tiles = job.len(),
                directory = %job.directory().display(),
                policy = %job.policy()
            );
            let _enter = span.enter();

            info!("Download job started");
            self.counters.begin_job();

            let report = self.execute(job, cancel);

            match &report.status {
                JobStatus::Completed => info!(
                    completed = report.completed_count(),
                    skipped = report.skipped_count(),
                    failed = report.failed_count(),
                    bytes = report.bytes_downloaded,
                    "Download job completed"
                ),
                JobStatus::Cancelled => info!(
                    completed = report.completed_count(),
                    not_attempted = report.not_attempted().len(),
                    "Download job cancelled"
                ),
                JobStatus::CriticalFailure(e) => error!(
                    error = %e,
                    not_attempted = report.not_attempted().len(),
                    "Download job aborted"
                ),
            }

            self.counters.set_phase(EnginePhase::from(&report.status));
            self.reporter.finished(&report);
            self.counters.set_phase(EnginePhase::Idle);
            report
        })
    }

    fn execute(&self, job: &DownloadJob, cancel: &CancellationToken) -> JobReport {
        let mut state = DownloadState::new(job.tiles());

        let store = match self.connector.connect() {
            Ok(store) => store,
            Err(e) => return self.abort(state, CriticalError::Connect(e)),
        };

        self.reporter.status("Calculating total download size...");
        let probe = SizeProbe::new(store.as_ref(), self.reporter.as_ref());
        let plan = match probe.estimate(job, cancel) {
            ProbeOutcome::Planned(plan) => plan,
            ProbeOutcome::Cancelled => {
                self.reporter.status("Download cancelled during size calculation.");
                return state.into_report(JobStatus::Cancelled);
            }
        };

        for tile in &plan.skipped {
            state.record(*tile, Outcome::Skipped(SkipReason::AlreadyExists));
        }
        state.begin_downloads(plan.tiles.len(), plan.estimated_total);
        self.counters.begin_downloads(plan.tiles.len(), plan.estimated_total);
        info!(
            to_download = plan.tiles.len(),
            skipped = plan.skipped.len(),
            estimated_bytes = plan.estimated_total,
            probe_failures = plan.probe_failures,
            "Size probe finished"
        );

        if !plan.tiles.is_empty() {
            if let Err(e) = prepare_directory(job.directory()) {
                return self.abort(state, e);
            }
        }

        let total = plan.tiles.len();
        let mut cancelled = false;

        for (i, tile) in plan.tiles.iter().enumerate() {
            if cancel.is_cancelled() {
                self.reporter.status("Download cancelled by user.");
                cancelled = true;
                break;
            }

            state.current_index = i + 1;
            self.counters.set_current_file(i + 1);
            self.reporter.file_progress(i + 1, total);

            let dest = job.local_path(tile);
            let file_name = tile.file_name();

            // The file may have appeared since the probe.
            if should_skip(job.policy(), &dest) {
                self.reporter.status(&format!("Skipping existing file: {}", file_name));
                state.record(*tile, Outcome::Skipped(SkipReason::AlreadyExists));
                continue;
            }

            self.reporter.status(&format!("Downloading: {}...", file_name));

            let outcome = match self.fetch_tile(store.as_ref(), tile, &dest, &mut state, cancel) {
                Ok(outcome) => outcome,
                Err(e) => {
                    state.record(*tile, Outcome::Failed(TileFailure::Local(e.to_string())));
                    return self.abort(state, e);
                }
            };

            match &outcome {
                Outcome::Completed => {
                    debug!(tile = %tile, "Tile downloaded");
                    self.reporter.status(&format!("Finished: {}", file_name));
                }
                Outcome::Cancelled => {
                    debug!(tile = %tile, "Tile cancelled, partial file removed");
                    self.reporter.status(&format!("Cancelled: {}", file_name));
                    cancelled = true;
                }
                Outcome::Failed(failure) => {
                    warn!(
                        tile = %tile,
                        key = %tile.remote_key(),
                        error = %failure,
                        "Tile failed"
                    );
                    self.reporter
                        .error(&format!("Error for {}: {}", file_name, failure));
                }
                Outcome::Skipped(_) | Outcome::NotAttempted => {}
            }
            state.record(*tile, outcome);
        }

        let status = if cancelled {
            JobStatus::Cancelled
        } else {
            JobStatus::Completed
        };
        state.into_report(status)
    }

    /// Stream one tile to `dest`.
    ///
    /// Remote problems come back as `Ok(Outcome::Failed)`. Only local I/O
    /// problems are returned as errors.
    fn fetch_tile(
        &self,
        store: &dyn TileStore,
        tile: &TileCoordinate,
        dest: &Path,
        state: &mut DownloadState,
        cancel: &CancellationToken,
    ) -> Result<Outcome, CriticalError> {
        let key = tile.remote_key();
        let mut stream = match store.open_object(&key) {
            Ok(stream) => stream,
            Err(e) => return Ok(Outcome::Failed(e.into())),
        };

        let write_error = |path: &Path, e: io::Error| CriticalError::Write {
            tile: *tile,
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let partial_path = self.config.partial_path(dest);
        let mut partial =
            PartialFile::create(&partial_path).map_err(|e| write_error(&partial_path, e))?;
        let mut buffer = vec![0u8; self.config.chunk_size];

        loop {
            let n = match read_chunk(&mut stream, &mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    let failure = StoreError::Stream {
                        key,
                        reason: e.to_string(),
                    };
                    return Ok(Outcome::Failed(failure.into()));
                }
            };

            partial
                .write_all(&buffer[..n])
                .map_err(|e| write_error(&partial_path, e))?;

            let downloaded = state.add_bytes(n as u64);
            self.counters.set_bytes_downloaded(downloaded);
            self.reporter.byte_progress(downloaded, state.estimated_total);

            if cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }
        }

        partial.commit(dest).map_err(|e| write_error(dest, e))?;
        Ok(Outcome::Completed)
    }

    fn abort(&self, state: DownloadState, e: CriticalError) -> JobReport {
        error!(error = %e, tile = ?e.tile(), "Critical download error");
        self.reporter.error(&format!("A critical error occurred: {}", e));
        state.into_report(JobStatus::CriticalFailure(e))
    }
}

/// Make sure the target directory exists and is a directory.
fn prepare_directory(directory: &Path) -> Result<(), CriticalError> {
    fs::create_dir_all(directory).map_err(|e| CriticalError::DirectoryUnavailable {
        path: directory.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A file being downloaded.
///
/// Removed on drop unless [`commit`](Self::commit) renamed it into place.
struct PartialFile {
    path: PathBuf,
    file: Option<File>,
}

impl PartialFile {
    fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "partial file already closed",
            )),
        }
    }

    /// Flush, close, and rename over `dest`.
    fn commit(mut self, dest: &Path) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        fs::rename(&self.path, dest)?;
        self.path = PathBuf::new();
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.path.as_os_str().is_empty() {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove partial file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::job::OverwritePolicy;
    use crate::download::progress::{ChannelReporter, DownloadEvent, NullReporter};
    use crate::store::{MemoryTileStore, StoreResult};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<DownloadEvent>) -> Vec<DownloadEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn byte_events(events: &[DownloadEvent]) -> Vec<(u64, u64)> {
        events
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::ByteProgress { downloaded, total } => Some((*downloaded, *total)),
                _ => None,
            })
            .collect()
    }

    fn engine(store: &Arc<MemoryTileStore>, reporter: Arc<dyn ProgressReporter>) -> DownloadEngine {
        DownloadEngine::new(Arc::new(Arc::clone(store)), reporter, LogSink::none())
    }

    /// Cancels its token once the cumulative byte count reaches a threshold.
    struct CancelAfterBytes {
        threshold: u64,
        token: CancellationToken,
    }

    impl ProgressReporter for CancelAfterBytes {
        fn file_progress(&self, _current: usize, _total: usize) {}
        fn byte_progress(&self, downloaded: u64, _total: u64) {
            if downloaded >= self.threshold {
                self.token.cancel();
            }
        }
        fn status(&self, _message: &str) {}
        fn error(&self, _message: &str) {}
        fn finished(&self, _report: &JobReport) {}
    }

    struct FailingConnector;

    impl StoreConnector for FailingConnector {
        fn connect(&self) -> StoreResult<Arc<dyn TileStore>> {
            Err(StoreError::Client("no TLS backend".to_string()))
        }
    }

    #[test]
    fn test_chunked_byte_progress() {
        let tile = TileCoordinate::new(46, 11);
        let store = Arc::new(MemoryTileStore::new().with_tile(tile, 1000));
        let dir = tempfile::tempdir().unwrap();
        let (reporter, mut rx) = ChannelReporter::new();

        let report = engine(&store, Arc::new(reporter))
            .with_config(DownloaderConfig::default().with_chunk_size(400))
            .run(
                &DownloadJob::new([tile], dir.path(), OverwritePolicy::Overwrite),
                &CancellationToken::new(),
            );

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(
            byte_events(&drain(&mut rx)),
            vec![(400, 1000), (800, 1000), (1000, 1000)]
        );
        let written = fs::read(tile.local_path(dir.path())).unwrap();
        assert_eq!(written.len(), 1000);
        assert_eq!(written[300], (300 % 251) as u8);
    }

    #[test]
    fn test_status_sequence_for_single_tile() {
        let tile = TileCoordinate::new(46, 11);
        let store = Arc::new(MemoryTileStore::new().with_tile(tile, 10));
        let dir = tempfile::tempdir().unwrap();
        let (reporter, mut rx) = ChannelReporter::new();

        engine(&store, Arc::new(reporter)).run(
            &DownloadJob::new([tile], dir.path(), OverwritePolicy::Overwrite),
            &CancellationToken::new(),
        );

        let statuses: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                DownloadEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect();
        let name = tile.file_name();
        assert_eq!(
            statuses,
            vec![
                "Calculating total download size...".to_string(),
                format!("Downloading: {}...", name),
                format!("Finished: {}", name),
            ]
        );
    }

    #[test]
    fn test_no_partial_file_left_after_success() {
        let tile = TileCoordinate::new(-1, -1);
        let store = Arc::new(MemoryTileStore::new().with_tile(tile, 64));
        let dir = tempfile::tempdir().unwrap();

        engine(&store, Arc::new(NullReporter)).run(
            &DownloadJob::new([tile], dir.path(), OverwritePolicy::Overwrite),
            &CancellationToken::new(),
        );

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(tile.file_name())]);
    }

    #[test]
    fn test_broken_stream_fails_tile_and_continues() {
        let broken = TileCoordinate::new(46, 11);
        let healthy = TileCoordinate::new(46, 12);
        let store = Arc::new(
            MemoryTileStore::new()
                .with_tile(broken, 1000)
                .with_tile(healthy, 500)
                .with_broken_stream(broken, 300),
        );
        let dir = tempfile::tempdir().unwrap();
        let (reporter, mut rx) = ChannelReporter::new();

        let report = engine(&store, Arc::new(reporter))
            .with_config(DownloaderConfig::default().with_chunk_size(100))
            .run(
                &DownloadJob::new([broken, healthy], dir.path(), OverwritePolicy::Overwrite),
                &CancellationToken::new(),
            );

        assert_eq!(report.status, JobStatus::Completed);
        assert!(matches!(
            report.outcome(&broken),
            Some(Outcome::Failed(TileFailure::Remote(StoreError::Stream { .. })))
        ));
        assert_eq!(report.outcome(&healthy), Some(&Outcome::Completed));
        assert!(!broken.local_path(dir.path()).exists());
        assert!(!DownloaderConfig::default()
            .partial_path(&broken.local_path(dir.path()))
            .exists());

        let events = drain(&mut rx);
        assert!(events.contains(&DownloadEvent::Error(format!(
            "Error for {}: {}",
            broken.file_name(),
            report.failures()[0].1
        ))));
    }

    #[test]
    fn test_cancel_mid_file_keeps_previous_copy() {
        let tile = TileCoordinate::new(46, 11);
        let store = Arc::new(MemoryTileStore::new().with_tile(tile, 1000));
        let dir = tempfile::tempdir().unwrap();
        let dest = tile.local_path(dir.path());
        fs::write(&dest, b"previous").unwrap();

        let cancel = CancellationToken::new();
        let reporter = CancelAfterBytes {
            threshold: 200,
            token: cancel.clone(),
        };

        let report = engine(&store, Arc::new(reporter))
            .with_config(DownloaderConfig::default().with_chunk_size(100))
            .run(
                &DownloadJob::new([tile], dir.path(), OverwritePolicy::Overwrite),
                &cancel,
            );

        assert_eq!(report.status, JobStatus::Cancelled);
        assert_eq!(report.outcome(&tile), Some(&Outcome::Cancelled));
        assert_eq!(report.bytes_downloaded, 200);
        assert_eq!(fs::read(&dest).unwrap(), b"previous");
        assert!(!DownloaderConfig::default().partial_path(&dest).exists());
    }

    #[test]
    fn test_connect_failure_is_critical() {
        let dir = tempfile::tempdir().unwrap();
        let (reporter, mut rx) = ChannelReporter::new();
        let tiles = [(46, 11), (46, 12)].map(TileCoordinate::from);

        let engine = DownloadEngine::new(
            Arc::new(FailingConnector),
            Arc::new(reporter),
            LogSink::none(),
        );
        let report = engine.run(
            &DownloadJob::new(tiles, dir.path(), OverwritePolicy::Overwrite),
            &CancellationToken::new(),
        );

        assert!(matches!(
            report.status,
            JobStatus::CriticalFailure(CriticalError::Connect(_))
        ));
        assert_eq!(report.not_attempted(), tiles.to_vec());

        let events = drain(&mut rx);
        let finished = events
            .iter()
            .filter(|e| matches!(e, DownloadEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);
        assert!(matches!(events.last(), Some(DownloadEvent::Finished(_))));
    }

    #[test]
    fn test_unusable_directory_is_critical() {
        let tile = TileCoordinate::new(46, 11);
        let store = Arc::new(MemoryTileStore::new().with_tile(tile, 10));
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("occupied");
        fs::write(&not_a_dir, b"file").unwrap();

        let report = engine(&store, Arc::new(NullReporter)).run(
            &DownloadJob::new([tile], &not_a_dir, OverwritePolicy::Overwrite),
            &CancellationToken::new(),
        );

        assert!(matches!(
            report.status,
            JobStatus::CriticalFailure(CriticalError::DirectoryUnavailable { .. })
        ));
        assert_eq!(report.not_attempted(), vec![tile]);
        assert_eq!(store.get_calls(), 0);
    }

    #[test]
    fn test_local_write_failure_is_critical() {
        let first = TileCoordinate::new(46, 11);
        let second = TileCoordinate::new(46, 12);
        let store = Arc::new(
            MemoryTileStore::new()
                .with_tile(first, 10)
                .with_tile(second, 10),
        );
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the final name makes the rename fail.
        fs::create_dir(first.local_path(dir.path())).unwrap();

        let report = engine(&store, Arc::new(NullReporter)).run(
            &DownloadJob::new([first, second], dir.path(), OverwritePolicy::Overwrite),
            &CancellationToken::new(),
        );

        let JobStatus::CriticalFailure(err) = &report.status else {
            panic!("expected a critical failure, got {:?}", report.status);
        };
        assert_eq!(err.tile(), Some(first));
        assert!(matches!(
            report.outcome(&first),
            Some(Outcome::Failed(TileFailure::Local(_)))
        ));
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.not_attempted(), vec![second]);
        assert!(!DownloaderConfig::default()
            .partial_path(&first.local_path(dir.path()))
            .exists());
    }

    #[test]
    fn test_counters_follow_job() {
        let tile = TileCoordinate::new(46, 11);
        let store = Arc::new(MemoryTileStore::new().with_tile(tile, 300));
        let dir = tempfile::tempdir().unwrap();
        let counters = Arc::new(ProgressCounters::new());

        engine(&store, Arc::new(NullReporter))
            .with_counters(Arc::clone(&counters))
            .run(
                &DownloadJob::new([tile], dir.path(), OverwritePolicy::Overwrite),
                &CancellationToken::new(),
            );

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.phase, EnginePhase::Idle);
        assert_eq!(snapshot.current_file, 1);
        assert_eq!(snapshot.total_files, 1);
        assert_eq!(snapshot.bytes_downloaded, 300);
        assert_eq!(snapshot.estimated_total, 300);
    }

    #[test]
    fn test_read_chunk_retries_interrupted() {
        struct Flaky {
            interrupted: bool,
            data: io::Cursor<Vec<u8>>,
        }

        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(io::Error::from(io::ErrorKind::Interrupted));
                }
                let n = buf.len().min(3);
                self.data.read(&mut buf[..n])
            }
        }

        let mut reader = Flaky {
            interrupted: false,
            data: io::Cursor::new(vec![7; 10]),
        };
        let mut buf = [0u8; 8];

        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 8);
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 2);
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 0);
    }
}
