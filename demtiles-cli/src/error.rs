//! CLI error types.

use thiserror::Error;

use demtiles::download::{ControllerError, CriticalError};
use demtiles::tile::BoundsError;

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid bounding box: {0}")]
    Bounds(#[from] BoundsError),

    #[error("nothing to download: give a bounding box or at least one --tile")]
    NoTiles,

    #[error("{0}")]
    Controller(#[from] ControllerError),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("failed to set signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("download worker exited without a report")]
    WorkerLost,

    #[error("A critical error occurred: {0}")]
    Critical(CriticalError),

    #[error("download cancelled")]
    Cancelled,

    #[error("{0} tile(s) failed to download")]
    TileFailures(usize),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Cancelled => 130,
            CliError::TileFailures(_) => 2,
            _ => 1,
        }
    }
}
