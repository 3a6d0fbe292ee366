//! Centralized tile naming conventions.
//!
//! This module is the single source of truth for Copernicus DEM GLO-30 naming:
//! - Base names (e.g., `Copernicus_DSM_COG_10_N46_00_E011_00_DEM`)
//! - Remote object keys (e.g., `{base}/{base}.tif`)
//! - Local file names (e.g., `{base}.tif`)
//!
//! All other modules should use these functions rather than constructing names directly.

use std::sync::OnceLock;

use regex::Regex;

use super::{TileCoordinate, TileKeyError};

/// Prefix shared by every GLO-30 object.
pub const BASE_NAME_PREFIX: &str = "Copernicus_DSM_COG_10_";

/// Suffix shared by every GLO-30 object.
pub const BASE_NAME_SUFFIX: &str = "_DEM";

/// File extension of the Cloud Optimized GeoTIFF payload.
pub const TILE_EXTENSION: &str = "tif";

/// Format the latitude component (`N46`, `S03`, `N00`).
pub fn latitude_label(lat: i32) -> String {
    let hemisphere = if lat >= 0 { 'N' } else { 'S' };
    format!("{}{:02}", hemisphere, lat.unsigned_abs())
}

/// Format the longitude component (`E011`, `W007`, `E000`).
pub fn longitude_label(lon: i32) -> String {
    let hemisphere = if lon >= 0 { 'E' } else { 'W' };
    format!("{}{:03}", hemisphere, lon.unsigned_abs())
}

/// Generate the base name for a tile.
///
/// # Format
///
/// `Copernicus_DSM_COG_10_{lat}_00_{lon}_00_DEM`
///
/// # Examples
///
/// ```
/// use demtiles::tile::tile_base_name;
///
/// assert_eq!(tile_base_name(46, 11), "Copernicus_DSM_COG_10_N46_00_E011_00_DEM");
/// assert_eq!(tile_base_name(-3, -7), "Copernicus_DSM_COG_10_S03_00_W007_00_DEM");
/// ```
pub fn tile_base_name(lat: i32, lon: i32) -> String {
    format!(
        "{}{}_00_{}_00{}",
        BASE_NAME_PREFIX,
        latitude_label(lat),
        longitude_label(lon),
        BASE_NAME_SUFFIX
    )
}

/// Generate the remote object key for a tile.
///
/// # Examples
///
/// ```
/// use demtiles::tile::remote_key;
///
/// assert_eq!(
///     remote_key(0, 0),
///     "Copernicus_DSM_COG_10_N00_00_E000_00_DEM/Copernicus_DSM_COG_10_N00_00_E000_00_DEM.tif"
/// );
/// ```
pub fn remote_key(lat: i32, lon: i32) -> String {
    let base = tile_base_name(lat, lon);
    format!("{}/{}.{}", base, base, TILE_EXTENSION)
}

/// Generate the local file name for a tile.
///
/// This is the last path segment of [`remote_key`].
pub fn local_file_name(lat: i32, lon: i32) -> String {
    format!("{}.{}", tile_base_name(lat, lon), TILE_EXTENSION)
}

fn base_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^Copernicus_DSM_COG_10_([NS])(\d{2,})_00_([EW])(\d{3,})_00_DEM$")
            .expect("tile base name pattern is valid")
    })
}

/// Parse a base name, local file name, or remote key back into its coordinate.
///
/// Only the exact spelling produced by [`tile_base_name`] is accepted: `S00`,
/// `W000` and surplus leading zeros are rejected, so parsing is the inverse of
/// formatting.
pub fn parse_key(key: &str) -> Result<TileCoordinate, TileKeyError> {
    let file = key.rsplit('/').next().unwrap_or(key);
    let base = file.strip_suffix(".tif").unwrap_or(file);

    // A remote key repeats the base name as its directory component.
    if let Some((dir, _)) = key.rsplit_once('/') {
        if dir != base {
            return Err(TileKeyError::Malformed(key.to_string()));
        }
    }

    let captures = base_name_pattern()
        .captures(base)
        .ok_or_else(|| TileKeyError::Malformed(key.to_string()))?;

    let lat = signed_component(&captures[1], &captures[2], 'S', 2, key)?;
    let lon = signed_component(&captures[3], &captures[4], 'W', 3, key)?;

    Ok(TileCoordinate::new(lat, lon))
}

fn signed_component(
    hemisphere: &str,
    digits: &str,
    negative: char,
    width: usize,
    key: &str,
) -> Result<i32, TileKeyError> {
    if digits.len() > width && digits.starts_with('0') {
        return Err(TileKeyError::NonCanonical(key.to_string()));
    }

    let magnitude: i64 = digits
        .parse()
        .map_err(|_| TileKeyError::OutOfRange(key.to_string()))?;

    let is_negative = hemisphere.starts_with(negative);
    if is_negative && magnitude == 0 {
        return Err(TileKeyError::NonCanonical(key.to_string()));
    }

    let value = if is_negative { -magnitude } else { magnitude };
    i32::try_from(value).map_err(|_| TileKeyError::OutOfRange(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base_name_northeast() {
        assert_eq!(
            tile_base_name(46, 11),
            "Copernicus_DSM_COG_10_N46_00_E011_00_DEM"
        );
    }

    #[test]
    fn test_base_name_southwest() {
        assert_eq!(
            tile_base_name(-3, -7),
            "Copernicus_DSM_COG_10_S03_00_W007_00_DEM"
        );
    }

    #[test]
    fn test_zero_is_north_and_east() {
        assert_eq!(latitude_label(0), "N00");
        assert_eq!(longitude_label(0), "E000");
    }

    #[test]
    fn test_grid_extremes() {
        assert_eq!(latitude_label(-90), "S90");
        assert_eq!(latitude_label(89), "N89");
        assert_eq!(longitude_label(-180), "W180");
        assert_eq!(longitude_label(179), "E179");
    }

    #[test]
    fn test_off_grid_still_formats() {
        assert_eq!(latitude_label(123), "N123");
        assert_eq!(longitude_label(-1234), "W1234");
    }

    #[test]
    fn test_remote_key_and_local_name() {
        let base = "Copernicus_DSM_COG_10_N46_00_E012_00_DEM";
        assert_eq!(remote_key(46, 12), format!("{}/{}.tif", base, base));
        assert_eq!(local_file_name(46, 12), format!("{}.tif", base));
    }

    #[test]
    fn test_parse_accepts_all_three_forms() {
        let expected = TileCoordinate::new(-3, -7);
        assert_eq!(parse_key(&tile_base_name(-3, -7)).unwrap(), expected);
        assert_eq!(parse_key(&local_file_name(-3, -7)).unwrap(), expected);
        assert_eq!(parse_key(&remote_key(-3, -7)).unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_negative_zero() {
        let err = parse_key("Copernicus_DSM_COG_10_S00_00_E011_00_DEM").unwrap_err();
        assert!(matches!(err, TileKeyError::NonCanonical(_)));

        let err = parse_key("Copernicus_DSM_COG_10_N10_00_W000_00_DEM").unwrap_err();
        assert!(matches!(err, TileKeyError::NonCanonical(_)));
    }

    #[test]
    fn test_parse_rejects_padding() {
        let err = parse_key("Copernicus_DSM_COG_10_N046_00_E011_00_DEM").unwrap_err();
        assert!(matches!(err, TileKeyError::NonCanonical(_)));
    }

    #[test]
    fn test_parse_rejects_mismatched_directory() {
        let key = format!("{}/{}", tile_base_name(1, 1), local_file_name(2, 2));
        assert!(matches!(
            parse_key(&key).unwrap_err(),
            TileKeyError::Malformed(_)
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_key("").is_err());
        assert!(parse_key("Copernicus_DSM_COG_10_N4_00_E011_00_DEM").is_err());
        assert!(parse_key("Copernicus_DSM_COG_30_N46_00_E011_00_DEM").is_err());
    }

    proptest! {
        #[test]
        fn prop_parse_inverts_format(lat in -90i32..=89, lon in -180i32..=179) {
            let parsed = parse_key(&remote_key(lat, lon)).unwrap();
            prop_assert_eq!(parsed, TileCoordinate::new(lat, lon));
        }

        #[test]
        fn prop_parse_inverts_format_off_grid(lat in any::<i32>(), lon in any::<i32>()) {
            let parsed = parse_key(&tile_base_name(lat, lon)).unwrap();
            prop_assert_eq!(parsed, TileCoordinate::new(lat, lon));
        }

        #[test]
        fn prop_distinct_tiles_have_distinct_keys(
            a in (-90i32..=89, -180i32..=179),
            b in (-90i32..=89, -180i32..=179),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(remote_key(a.0, a.1), remote_key(b.0, b.1));
        }
    }
}
