//! Download job definition.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::tile::{TileCoordinate, TileSelection};

/// What to do with a tile whose local file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Download again and replace the existing file.
    #[default]
    Overwrite,
    /// Leave the existing file untouched.
    Skip,
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// One unit of work for the download engine.
///
/// Built once, consumed by a single engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    tiles: Vec<TileCoordinate>,
    directory: PathBuf,
    policy: OverwritePolicy,
}

impl DownloadJob {
    /// Create a job. Duplicate tiles are dropped, keeping the first occurrence.
    pub fn new(
        tiles: impl IntoIterator<Item = TileCoordinate>,
        directory: impl Into<PathBuf>,
        policy: OverwritePolicy,
    ) -> Self {
        let mut seen = HashSet::new();
        let tiles = tiles.into_iter().filter(|t| seen.insert(*t)).collect();

        Self {
            tiles,
            directory: directory.into(),
            policy,
        }
    }

    /// Create a job from a selection, in the selection's sorted order.
    pub fn from_selection(
        selection: &TileSelection,
        directory: impl Into<PathBuf>,
        policy: OverwritePolicy,
    ) -> Self {
        Self::new(selection.iter().copied(), directory, policy)
    }

    pub fn tiles(&self) -> &[TileCoordinate] {
        &self.tiles
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn policy(&self) -> OverwritePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Local path of a tile in this job's directory.
    pub fn local_path(&self, tile: &TileCoordinate) -> PathBuf {
        tile.local_path(&self.directory)
    }
}

/// Tiles whose local file already exists in `directory`.
///
/// Lets a controller ask "overwrite or skip?" before starting a job.
pub fn existing_tiles<'a>(
    directory: &Path,
    tiles: impl IntoIterator<Item = &'a TileCoordinate>,
) -> Vec<TileCoordinate> {
    tiles
        .into_iter()
        .filter(|tile| tile.local_path(directory).exists())
        .copied()
        .collect()
}
