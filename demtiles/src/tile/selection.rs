//! Set of tiles picked by the user.

use std::collections::BTreeSet;

use super::TileCoordinate;

/// The user's current tile selection.
///
/// Iteration is ordered by latitude, then longitude, so jobs built from a
/// selection are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSelection {
    tiles: BTreeSet<TileCoordinate>,
}

impl TileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a tile in or out of the selection.
    ///
    /// Returns `true` if the tile is selected afterwards.
    pub fn toggle(&mut self, tile: TileCoordinate) -> bool {
        if self.tiles.remove(&tile) {
            false
        } else {
            self.tiles.insert(tile);
            true
        }
    }

    /// Add a tile. Returns `false` if it was already selected.
    pub fn select(&mut self, tile: TileCoordinate) -> bool {
        self.tiles.insert(tile)
    }

    /// Remove a tile. Returns `false` if it was not selected.
    pub fn deselect(&mut self, tile: &TileCoordinate) -> bool {
        self.tiles.remove(tile)
    }

    /// Replace the selection. Returns `true` if anything changed.
    pub fn set(&mut self, tiles: impl IntoIterator<Item = TileCoordinate>) -> bool {
        let tiles: BTreeSet<_> = tiles.into_iter().collect();
        if tiles == self.tiles {
            return false;
        }
        self.tiles = tiles;
        true
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn contains(&self, tile: &TileCoordinate) -> bool {
        self.tiles.contains(tile)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileCoordinate> {
        self.tiles.iter()
    }
}

impl FromIterator<TileCoordinate> for TileSelection {
    fn from_iter<I: IntoIterator<Item = TileCoordinate>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TileSelection {
    type Item = &'a TileCoordinate;
    type IntoIter = std::collections::btree_set::Iter<'a, TileCoordinate>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut selection = TileSelection::new();
        let tile = TileCoordinate::new(46, 11);

        assert!(selection.toggle(tile));
        assert!(selection.contains(&tile));
        assert!(!selection.toggle(tile));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_iteration_is_sorted() {
        let selection: TileSelection = [(46, 12), (-3, -7), (46, 11)]
            .into_iter()
            .map(TileCoordinate::from)
            .collect();

        let tiles: Vec<_> = selection.iter().copied().collect();
        assert_eq!(
            tiles,
            vec![
                TileCoordinate::new(-3, -7),
                TileCoordinate::new(46, 11),
                TileCoordinate::new(46, 12),
            ]
        );
    }

    #[test]
    fn test_set_reports_change() {
        let mut selection = TileSelection::new();
        assert!(selection.set([TileCoordinate::new(1, 1)]));
        assert!(!selection.set([TileCoordinate::new(1, 1)]));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_select_and_clear() {
        let mut selection = TileSelection::new();
        assert!(selection.select(TileCoordinate::new(0, 0)));
        assert!(!selection.select(TileCoordinate::new(0, 0)));
        assert!(selection.deselect(&TileCoordinate::new(0, 0)));
        selection.select(TileCoordinate::new(5, 5));
        selection.clear();
        assert!(selection.is_empty());
    }
}
