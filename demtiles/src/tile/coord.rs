//! Tile coordinate type.

use std::fmt;
use std::path::{Path, PathBuf};

use super::naming;
use super::TileKeyError;

/// Southernmost tile latitude on the GLO-30 grid.
pub const MIN_TILE_LAT: i32 = -90;

/// Northernmost tile latitude on the GLO-30 grid.
pub const MAX_TILE_LAT: i32 = 89;

/// Westernmost tile longitude on the GLO-30 grid.
pub const MIN_TILE_LON: i32 = -180;

/// Easternmost tile longitude on the GLO-30 grid.
pub const MAX_TILE_LON: i32 = 179;

/// A 1°×1° elevation tile identified by its southwest corner.
///
/// Coordinates are not range-checked: an off-grid coordinate still has a
/// well-formed key, it just does not exist remotely. Use [`is_on_grid`]
/// where that matters.
///
/// [`is_on_grid`]: TileCoordinate::is_on_grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    /// Latitude of the southern edge in whole degrees.
    pub lat: i32,
    /// Longitude of the western edge in whole degrees.
    pub lon: i32,
}

impl TileCoordinate {
    /// Create a tile coordinate.
    pub const fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Parse a base name, local file name, or remote key.
    pub fn from_key(key: &str) -> Result<Self, TileKeyError> {
        naming::parse_key(key)
    }

    /// Whether the tile lies inside the physical 1° grid.
    pub fn is_on_grid(&self) -> bool {
        (MIN_TILE_LAT..=MAX_TILE_LAT).contains(&self.lat)
            && (MIN_TILE_LON..=MAX_TILE_LON).contains(&self.lon)
    }

    /// Base name shared by the remote key and local file.
    pub fn base_name(&self) -> String {
        naming::tile_base_name(self.lat, self.lon)
    }

    /// Object key in the remote bucket.
    pub fn remote_key(&self) -> String {
        naming::remote_key(self.lat, self.lon)
    }

    /// File name of the tile on local disk.
    pub fn file_name(&self) -> String {
        naming::local_file_name(self.lat, self.lon)
    }

    /// Full local path of the tile inside `directory`.
    pub fn local_path(&self, directory: &Path) -> PathBuf {
        directory.join(self.file_name())
    }
}

impl From<(i32, i32)> for TileCoordinate {
    fn from((lat, lon): (i32, i32)) -> Self {
        Self::new(lat, lon)
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            naming::latitude_label(self.lat),
            naming::longitude_label(self.lon)
        )
    }
}
