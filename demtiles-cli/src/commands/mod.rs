//! CLI command implementations.

pub mod download;
pub mod list;

use demtiles::tile::{BoundingBox, TileSelection};

use crate::error::CliError;

/// Build a bounding box from `[min_lon, min_lat, max_lon, max_lat]`.
fn bounding_box(values: &[f64]) -> Result<BoundingBox, CliError> {
    match values {
        [min_lon, min_lat, max_lon, max_lat] => {
            Ok(BoundingBox::new(*min_lon, *min_lat, *max_lon, *max_lat)?)
        }
        // clap enforces four values
        _ => Err(CliError::NoTiles),
    }
}

/// Tiles covering `values` as a selection.
fn bbox_selection(values: &[f64]) -> Result<TileSelection, CliError> {
    Ok(bounding_box(values)?.tiles().into_iter().collect())
}
