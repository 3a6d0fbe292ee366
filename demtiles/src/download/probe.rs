//! Pre-flight size estimation.
//!
//! Before any body is transferred, every tile in the job is probed with a
//! metadata request so that byte progress has a denominator. Probe failures
//! only shrink the estimate; the tile stays in the download set and gets its
//! own chance (and its own error) during the download phase.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::job::{DownloadJob, OverwritePolicy};
use super::progress::ProgressReporter;
use crate::store::TileStore;
use crate::tile::TileCoordinate;

/// What the download phase should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Tiles to download, in job order.
    pub tiles: Vec<TileCoordinate>,
    /// Tiles left alone because their file exists and the policy is `Skip`.
    pub skipped: Vec<TileCoordinate>,
    /// Sum of the sizes the store reported. A lower bound when probes failed.
    pub estimated_total: u64,
    /// Tiles whose size could not be determined.
    pub probe_failures: usize,
}

/// Result of a probe pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Planned(DownloadPlan),
    /// A stop request arrived; nothing should be downloaded.
    Cancelled,
}

/// Estimates the size of a job against a store.
pub struct SizeProbe<'a> {
    store: &'a dyn TileStore,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> SizeProbe<'a> {
    pub fn new(store: &'a dyn TileStore, reporter: &'a dyn ProgressReporter) -> Self {
        Self { store, reporter }
    }

    /// Probe every tile of `job`, polling `cancel` before each one.
    pub fn estimate(&self, job: &DownloadJob, cancel: &CancellationToken) -> ProbeOutcome {
        let mut plan = DownloadPlan {
            tiles: Vec::with_capacity(job.len()),
            skipped: Vec::new(),
            estimated_total: 0,
            probe_failures: 0,
        };

        for tile in job.tiles() {
            if cancel.is_cancelled() {
                debug!(probed = plan.tiles.len(), "Size probe cancelled");
                return ProbeOutcome::Cancelled;
            }

            if should_skip(job.policy(), &job.local_path(tile)) {
                self.reporter
                    .status(&format!("Skipping existing file: {}", tile.file_name()));
                plan.skipped.push(*tile);
                continue;
            }

            let key = tile.remote_key();
            match self.store.object_size(&key) {
                Ok(size) => {
                    trace!(tile = %tile, key = %key, size, "Probed tile size");
                    plan.estimated_total += size;
                }
                Err(e) => {
                    debug!(tile = %tile, key = %key, error = %e, "Size probe failed");
                    plan.probe_failures += 1;
                }
            }
            plan.tiles.push(*tile);
        }

        ProbeOutcome::Planned(plan)
    }
}

/// Whether a tile should be left alone under `policy`.
pub(crate) fn should_skip(policy: OverwritePolicy, path: &Path) -> bool {
    policy == OverwritePolicy::Skip && path.exists()
}
