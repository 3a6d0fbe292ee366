//! Bounding box to tile enumeration.

use super::{BoundsError, TileCoordinate};

/// Geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a validated bounding box.
    ///
    /// Arguments follow the `min_lon min_lat max_lon max_lat` order used by
    /// most bbox tools.
    pub fn new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, BoundsError> {
        for lon in [min_lon, max_lon] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(BoundsError::InvalidLongitude(lon));
            }
        }
        for lat in [min_lat, max_lat] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(BoundsError::InvalidLatitude(lat));
            }
        }
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(BoundsError::Inverted);
        }

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Tiles covering the box, south to north, then west to east.
    pub fn tiles(&self) -> Vec<TileCoordinate> {
        let lat_start = self.min_lat.floor() as i32;
        let lat_end = self.max_lat.ceil() as i32;
        let lon_start = self.min_lon.floor() as i32;
        let lon_end = self.max_lon.ceil() as i32;

        (lat_start..lat_end)
            .flat_map(|lat| (lon_start..lon_end).map(move |lon| TileCoordinate::new(lat, lon)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dolomites_box() {
        let bbox = BoundingBox::new(11.8, 46.5, 12.2, 46.7).unwrap();
        assert_eq!(
            bbox.tiles(),
            vec![TileCoordinate::new(46, 11), TileCoordinate::new(46, 12)]
        );
    }

    #[test]
    fn test_integer_edges_are_exclusive() {
        let bbox = BoundingBox::new(10.0, 46.0, 11.0, 47.0).unwrap();
        assert_eq!(bbox.tiles(), vec![TileCoordinate::new(46, 10)]);
    }

    #[test]
    fn test_southwest_hemispheres() {
        let bbox = BoundingBox::new(-7.5, -3.5, -6.5, -2.5).unwrap();
        assert_eq!(
            bbox.tiles(),
            vec![
                TileCoordinate::new(-4, -8),
                TileCoordinate::new(-4, -7),
                TileCoordinate::new(-3, -8),
                TileCoordinate::new(-3, -7),
            ]
        );
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            BoundingBox::new(-181.0, 0.0, 0.0, 1.0),
            Err(BoundsError::InvalidLongitude(_))
        ));
        assert!(matches!(
            BoundingBox::new(0.0, 0.0, 1.0, 91.0),
            Err(BoundsError::InvalidLatitude(_))
        ));
    }

    #[test]
    fn test_rejects_inverted() {
        assert!(matches!(
            BoundingBox::new(12.0, 46.0, 11.0, 47.0),
            Err(BoundsError::Inverted)
        ));
        assert!(matches!(
            BoundingBox::new(11.0, 46.0, 12.0, 46.0),
            Err(BoundsError::Inverted)
        ));
    }
}
