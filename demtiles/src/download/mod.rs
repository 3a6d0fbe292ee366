//! Cancellable tile downloads.
//!
//! This module provides the download side of the crate, including:
//! - Job definition and overwrite policy (`job`)
//! - Pre-flight size estimation (`probe`)
//! - Per-tile outcomes and the terminal report (`state`)
//! - Progress reporting and shared counters (`progress`)
//! - The sequential chunked download loop (`engine`)
//! - Worker-thread lifecycle and job exclusivity (`controller`)
//!
//! # Architecture
//!
//! ```text
//! DownloadController (one job at a time, one worker thread per job)
//!         │
//!         └── DownloadEngine
//!                 │
//!                 ├── StoreConnector ──► TileStore (HEAD / streaming GET)
//!                 │
//!                 ├── SizeProbe (estimated total, skip filtering)
//!                 │
//!                 ├── DownloadState ──► JobReport
//!                 │
//!                 └── ProgressReporter (file, bytes, status, error, finished)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use demtiles::download::{ChannelReporter, DownloadController, DownloadJob, OverwritePolicy};
//! use demtiles::logging::LogSink;
//! use demtiles::store::S3Config;
//! use demtiles::tile::TileCoordinate;
//!
//! let (reporter, mut events) = ChannelReporter::new();
//! let controller = DownloadController::new(
//!     Arc::new(S3Config::default()),
//!     Arc::new(reporter),
//!     LogSink::current(),
//! );
//!
//! let job = DownloadJob::new([TileCoordinate::new(46, 11)], "dem", OverwritePolicy::Skip);
//! controller.start(job)?;
//!
//! while let Some(event) = events.blocking_recv() {
//!     println!("{:?}", event);
//! }
//! ```

mod config;
mod controller;
mod engine;
mod error;
mod job;
mod probe;
mod progress;
mod state;

pub use config::{DownloaderConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PARTIAL_SUFFIX};
pub use controller::DownloadController;
pub use engine::DownloadEngine;
pub use error::{ControllerError, CriticalError, TileFailure};
pub use job::{existing_tiles, DownloadJob, OverwritePolicy};
pub use probe::{DownloadPlan, ProbeOutcome, SizeProbe};
pub use progress::{
    ChannelReporter, DownloadEvent, EnginePhase, NullReporter, ProgressCounters,
    ProgressReporter, ProgressSnapshot,
};
pub use state::{DownloadState, JobReport, JobStatus, Outcome, SkipReason, TileOutcome};
