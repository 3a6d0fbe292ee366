//! Tile addressing.
//!
//! Maps integer tile coordinates to Copernicus DEM GLO-30 object keys and
//! local file names, and back. Everything here is pure: no I/O, no range
//! validation beyond what [`BoundingBox`] enforces on user input.
//!
//! # Example
//!
//! ```
//! use demtiles::tile::TileCoordinate;
//!
//! let tile = TileCoordinate::new(46, 11);
//! assert_eq!(tile.base_name(), "Copernicus_DSM_COG_10_N46_00_E011_00_DEM");
//! assert_eq!(TileCoordinate::from_key(&tile.remote_key()).unwrap(), tile);
//! ```

mod bounds;
mod coord;
mod naming;
mod selection;

pub use bounds::BoundingBox;
pub use coord::{TileCoordinate, MAX_TILE_LAT, MAX_TILE_LON, MIN_TILE_LAT, MIN_TILE_LON};
pub use naming::{latitude_label, local_file_name, longitude_label, remote_key, tile_base_name};
pub use selection::TileSelection;

use thiserror::Error;

/// Errors from parsing a tile key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TileKeyError {
    /// The string is not a GLO-30 tile name.
    #[error("not a Copernicus DEM tile key: {0}")]
    Malformed(String),

    /// The string names a tile but not in canonical spelling.
    #[error("non-canonical tile key: {0}")]
    NonCanonical(String),

    /// A coordinate component does not fit in an `i32`.
    #[error("tile coordinate out of range in key: {0}")]
    OutOfRange(String),
}

/// Errors from validating a bounding box.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoundsError {
    #[error("invalid longitude {0}: must be between -180 and 180")]
    InvalidLongitude(f64),

    #[error("invalid latitude {0}: must be between -90 and 90")]
    InvalidLatitude(f64),

    #[error("minimum coordinates must be less than maximum coordinates")]
    Inverted,
}
