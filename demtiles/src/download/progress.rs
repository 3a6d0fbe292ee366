//! Progress reporting for download jobs.
//!
//! The engine drives a [`ProgressReporter`] from its single worker thread, so
//! calls for one job never overlap. Under a
//! [`DownloadController`](super::DownloadController) the next job may start
//! while the previous job's `finished` is still running, so a reporter shared
//! across jobs can see that call overlap the new job's first events.
//! Observers that only need numbers can instead poll the lock-free
//! [`ProgressCounters`].

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::state::{JobReport, JobStatus};

/// Observer of a running job.
///
/// Every job produces exactly one [`finished`](ProgressReporter::finished)
/// call, whichever way it ends.
pub trait ProgressReporter: Send + Sync {
    /// Tile `current` of `total` in the download set is starting (1-based).
    fn file_progress(&self, current: usize, total: usize);

    /// Cumulative bytes written, against the estimated total.
    fn byte_progress(&self, downloaded: u64, total: u64);

    /// Human-readable status line.
    fn status(&self, message: &str);

    /// A tile failed; the job continues.
    fn error(&self, message: &str);

    /// The job has ended.
    fn finished(&self, report: &JobReport);
}

impl<R: ProgressReporter + ?Sized> ProgressReporter for Arc<R> {
    fn file_progress(&self, current: usize, total: usize) {
        (**self).file_progress(current, total)
    }

    fn byte_progress(&self, downloaded: u64, total: u64) {
        (**self).byte_progress(downloaded, total)
    }

    fn status(&self, message: &str) {
        (**self).status(message)
    }

    fn error(&self, message: &str) {
        (**self).error(message)
    }

    fn finished(&self, report: &JobReport) {
        (**self).finished(report)
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn file_progress(&self, _current: usize, _total: usize) {}
    fn byte_progress(&self, _downloaded: u64, _total: u64) {}
    fn status(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn finished(&self, _report: &JobReport) {}
}

/// A single reporter call, as a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    FileProgress { current: usize, total: usize },
    ByteProgress { downloaded: u64, total: u64 },
    Status(String),
    Error(String),
    Finished(JobReport),
}

/// Reporter that forwards every call over an unbounded channel.
///
/// `send` never blocks the worker. The receiver can be drained from async
/// code with `recv().await` or from a plain thread with `blocking_recv()`.
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: DownloadEvent) {
        let _ = self.tx.send(event);
    }
}

impl ProgressReporter for ChannelReporter {
    fn file_progress(&self, current: usize, total: usize) {
        self.send(DownloadEvent::FileProgress { current, total });
    }

    fn byte_progress(&self, downloaded: u64, total: u64) {
        self.send(DownloadEvent::ByteProgress { downloaded, total });
    }

    fn status(&self, message: &str) {
        self.send(DownloadEvent::Status(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.send(DownloadEvent::Error(message.to_string()));
    }

    fn finished(&self, report: &JobReport) {
        self.send(DownloadEvent::Finished(report.clone()));
    }
}

/// Phase of the engine's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnginePhase {
    Idle = 0,
    Probing = 1,
    Downloading = 2,
    Completed = 3,
    Cancelled = 4,
    CriticalFailure = 5,
}

impl EnginePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Probing,
            2 => Self::Downloading,
            3 => Self::Completed,
            4 => Self::Cancelled,
            5 => Self::CriticalFailure,
            _ => Self::Idle,
        }
    }

    /// Whether this is one of the end states of a job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::CriticalFailure
        )
    }
}

impl From<&JobStatus> for EnginePhase {
    fn from(status: &JobStatus) -> Self {
        match status {
            JobStatus::Completed => Self::Completed,
            JobStatus::Cancelled => Self::Cancelled,
            JobStatus::CriticalFailure(_) => Self::CriticalFailure,
        }
    }
}

/// Shared progress counters.
///
/// Written by the worker, read by any thread through [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct ProgressCounters {
    phase: AtomicU8,
    current_file: AtomicUsize,
    total_files: AtomicUsize,
    bytes_downloaded: AtomicU64,
    estimated_total: AtomicU64,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new job and enter the probing phase.
    pub fn begin_job(&self) {
        self.current_file.store(0, Ordering::SeqCst);
        self.total_files.store(0, Ordering::SeqCst);
        self.bytes_downloaded.store(0, Ordering::SeqCst);
        self.estimated_total.store(0, Ordering::SeqCst);
        self.set_phase(EnginePhase::Probing);
    }

    /// Enter the download phase.
    pub fn begin_downloads(&self, total_files: usize, estimated_total: u64) {
        self.total_files.store(total_files, Ordering::SeqCst);
        self.estimated_total.store(estimated_total, Ordering::SeqCst);
        self.set_phase(EnginePhase::Downloading);
    }

    pub fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub fn set_current_file(&self, current: usize) {
        self.current_file.store(current, Ordering::SeqCst);
    }

    pub fn set_bytes_downloaded(&self, bytes: u64) {
        self.bytes_downloaded.store(bytes, Ordering::SeqCst);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: EnginePhase::from_u8(self.phase.load(Ordering::SeqCst)),
            current_file: self.current_file.load(Ordering::SeqCst),
            total_files: self.total_files.load(Ordering::SeqCst),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::SeqCst),
            estimated_total: self.estimated_total.load(Ordering::SeqCst),
        }
    }
}

/// Copy of [`ProgressCounters`] at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub phase: EnginePhase,
    pub current_file: usize,
    pub total_files: usize,
    pub bytes_downloaded: u64,
    pub estimated_total: u64,
}

impl ProgressSnapshot {
    /// Byte progress as a ratio (0.0 to 1.0), capped at 1.0.
    pub fn ratio(&self) -> f64 {
        if self.estimated_total == 0 {
            return 0.0;
        }
        (self.bytes_downloaded as f64 / self.estimated_total as f64).min(1.0)
    }
}
