//! Error types for download jobs.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;
use crate::tile::TileCoordinate;

/// Why a single tile failed. The job continues past these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TileFailure {
    /// The remote object could not be fetched.
    #[error(transparent)]
    Remote(#[from] StoreError),

    /// The local file could not be written.
    #[error("local write failed: {0}")]
    Local(String),
}

/// Errors that abort a whole job.
///
/// Reported once, through the terminal report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CriticalError {
    /// The store client could not be created.
    #[error("could not connect to tile store: {0}")]
    Connect(#[from] StoreError),

    /// The target directory does not exist and cannot be created.
    #[error("target directory {} is unavailable: {reason}", .path.display())]
    DirectoryUnavailable { path: PathBuf, reason: String },

    /// A tile file could not be written into the target directory.
    #[error("cannot write {tile} to {}: {reason}", .path.display())]
    Write {
        tile: TileCoordinate,
        path: PathBuf,
        reason: String,
    },
}

impl CriticalError {
    /// The tile being processed when the job aborted, if any.
    pub fn tile(&self) -> Option<TileCoordinate> {
        match self {
            Self::Write { tile, .. } => Some(*tile),
            _ => None,
        }
    }
}

/// Errors returned when a job cannot be started.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Another job is still running on this controller.
    #[error("a download job is already in progress")]
    JobInProgress,

    /// Another job in this process targets the same directory.
    #[error("directory {} is already in use by another download", .0.display())]
    DirectoryBusy(PathBuf),

    /// The worker thread could not be spawned.
    #[error("failed to spawn download worker: {0}")]
    Spawn(#[source] std::io::Error),
}
