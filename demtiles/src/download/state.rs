//! Download state management.
//!
//! This module provides the engine-owned mutable state of a running job and
//! the immutable report it turns into once the job ends.

use std::collections::HashMap;
use std::fmt;

use super::error::{CriticalError, TileFailure};
use crate::tile::TileCoordinate;

/// Why a tile was not downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The local file exists and the job's policy is `Skip`.
    AlreadyExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "local file already exists"),
        }
    }
}

/// Final result for one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was downloaded in full.
    Completed,
    /// The tile was deliberately left alone.
    Skipped(SkipReason),
    /// Cancellation arrived while the tile was streaming; its partial file was removed.
    Cancelled,
    /// The tile could not be downloaded; the job moved on.
    Failed(TileFailure),
    /// The job ended before reaching this tile.
    NotAttempted,
}

impl Outcome {
    /// Whether the tile's file is present and complete on disk.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped(_))
    }
}

/// Outcome paired with the tile it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileOutcome {
    pub tile: TileCoordinate,
    pub outcome: Outcome,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Every tile was attempted. Individual tiles may still have failed.
    Completed,
    /// A stop request ended the job early.
    Cancelled,
    /// The job was aborted.
    CriticalFailure(CriticalError),
}

impl JobStatus {
    /// Message for the user once the job has ended.
    pub fn message(&self) -> String {
        match self {
            Self::Completed => "All downloads completed!".to_string(),
            Self::Cancelled => "Download cancelled.".to_string(),
            Self::CriticalFailure(err) => format!("A critical error occurred: {}", err),
        }
    }
}

/// Mutable state of a running job.
///
/// Owned by the engine for the duration of one run.
#[derive(Debug, Clone)]
pub struct DownloadState {
    /// Number of tiles in the download set (after probe filtering).
    pub total_tiles: usize,
    /// 1-based index of the tile being processed, 0 before the first.
    pub current_index: usize,
    /// Bytes written to disk so far, across all tiles.
    pub bytes_downloaded: u64,
    /// Estimated size of the download set (lower bound when probes fail).
    pub estimated_total: u64,
    outcomes: Vec<(TileCoordinate, Option<Outcome>)>,
    index: HashMap<TileCoordinate, usize>,
}

impl DownloadState {
    /// Create state for the given job tiles.
    pub fn new(tiles: &[TileCoordinate]) -> Self {
        Self {
            total_tiles: 0,
            current_index: 0,
            bytes_downloaded: 0,
            estimated_total: 0,
            outcomes: tiles.iter().map(|t| (*t, None)).collect(),
            index: tiles.iter().enumerate().map(|(i, t)| (*t, i)).collect(),
        }
    }

    /// Enter the download phase with the probed download set.
    pub fn begin_downloads(&mut self, total_tiles: usize, estimated_total: u64) {
        self.total_tiles = total_tiles;
        self.estimated_total = estimated_total;
    }

    /// Add bytes written for the current tile. Returns the new cumulative total.
    pub fn add_bytes(&mut self, bytes: u64) -> u64 {
        self.bytes_downloaded += bytes;
        self.bytes_downloaded
    }

    /// Record a tile's outcome.
    ///
    /// Outcomes are final: a second record for the same tile is ignored.
    pub fn record(&mut self, tile: TileCoordinate, outcome: Outcome) {
        if let Some(&i) = self.index.get(&tile) {
            let slot = &mut self.outcomes[i].1;
            if slot.is_none() {
                *slot = Some(outcome);
            }
        }
    }

    /// Outcome recorded for a tile so far.
    pub fn outcome(&self, tile: &TileCoordinate) -> Option<&Outcome> {
        self.index
            .get(tile)
            .and_then(|&i| self.outcomes[i].1.as_ref())
    }

    /// Mark every tile without an outcome as not attempted.
    pub fn mark_remaining_not_attempted(&mut self) {
        for (_, slot) in &mut self.outcomes {
            if slot.is_none() {
                *slot = Some(Outcome::NotAttempted);
            }
        }
    }

    /// Freeze the state into a report.
    pub fn into_report(mut self, status: JobStatus) -> JobReport {
        self.mark_remaining_not_attempted();
        JobReport {
            status,
            outcomes: self
                .outcomes
                .into_iter()
                .map(|(tile, outcome)| TileOutcome {
                    tile,
                    outcome: outcome.unwrap_or(Outcome::NotAttempted),
                })
                .collect(),
            bytes_downloaded: self.bytes_downloaded,
            estimated_total: self.estimated_total,
        }
    }
}

/// Result of a finished job, in job order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub status: JobStatus,
    pub outcomes: Vec<TileOutcome>,
    pub bytes_downloaded: u64,
    pub estimated_total: u64,
}

impl JobReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    pub fn completed_count(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Completed))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// Tiles that failed, with the reason.
    pub fn failures(&self) -> Vec<(TileCoordinate, &TileFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                Outcome::Failed(failure) => Some((o.tile, failure)),
                _ => None,
            })
            .collect()
    }

    /// Tiles the job never reached.
    pub fn not_attempted(&self) -> Vec<TileCoordinate> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::NotAttempted)
            .map(|o| o.tile)
            .collect()
    }

    /// Outcome for a single tile.
    pub fn outcome(&self, tile: &TileCoordinate) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| &o.tile == tile)
            .map(|o| &o.outcome)
    }

    /// Whether every tile is now present on disk.
    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Completed && self.outcomes.iter().all(|o| o.outcome.is_done())
    }

    /// Progress as a percentage.
    ///
    /// Byte-based when an estimate exists, otherwise based on tiles present.
    /// Capped at 100, since the estimate leaves out tiles whose size probe
    /// failed.
    pub fn progress_percent(&self) -> f64 {
        if self.estimated_total == 0 {
            if self.outcomes.is_empty() {
                100.0
            } else {
                let done = self.count(Outcome::is_done);
                (done as f64 / self.outcomes.len() as f64) * 100.0
            }
        } else {
            (self.bytes_downloaded as f64 / self.estimated_total as f64 * 100.0).min(100.0)
        }
    }
}
