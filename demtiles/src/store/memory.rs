//! In-memory tile store.
//!
//! Serves objects from a map, counts calls, and can inject probe and
//! stream failures. Used for offline runs and tests.

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{ObjectStream, StoreError, StoreResult, TileStore};
use crate::tile::TileCoordinate;

#[derive(Debug, Default)]
struct Objects {
    bodies: HashMap<String, Arc<[u8]>>,
    failing_probes: HashSet<String>,
    broken_streams: HashMap<String, usize>,
}

/// Tile store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    objects: RwLock<Objects>,
    head_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object under an arbitrary key.
    pub fn insert(&self, key: impl Into<String>, body: Vec<u8>) {
        self.objects.write().bodies.insert(key.into(), Arc::from(body));
    }

    /// Store a tile whose body is `size` bytes of a repeating pattern.
    pub fn insert_tile(&self, tile: TileCoordinate, size: usize) {
        let body = (0..size).map(|i| (i % 251) as u8).collect();
        self.insert(tile.remote_key(), body);
    }

    /// Builder form of [`insert_tile`](Self::insert_tile).
    pub fn with_tile(self, tile: TileCoordinate, size: usize) -> Self {
        self.insert_tile(tile, size);
        self
    }

    /// Make HEAD fail for a tile while GET keeps working.
    pub fn with_failing_probe(self, tile: TileCoordinate) -> Self {
        self.objects.write().failing_probes.insert(tile.remote_key());
        self
    }

    /// Make the body stream of a tile fail after `after_bytes` bytes.
    pub fn with_broken_stream(self, tile: TileCoordinate, after_bytes: usize) -> Self {
        self.objects
            .write()
            .broken_streams
            .insert(tile.remote_key(), after_bytes);
        self
    }

    /// Number of HEAD requests served.
    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    /// Number of GET requests served.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

impl TileStore for MemoryTileStore {
    fn object_size(&self, key: &str) -> StoreResult<u64> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.read();

        if objects.failing_probes.contains(key) {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: 503,
            });
        }

        objects
            .bodies
            .get(key)
            .map(|body| body.len() as u64)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn open_object(&self, key: &str) -> StoreResult<ObjectStream> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.read();

        let body = objects
            .bodies
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;

        match objects.broken_streams.get(key) {
            Some(&limit) => Ok(Box::new(BrokenStream {
                inner: Cursor::new(body),
                remaining: limit,
            })),
            None => Ok(Box::new(Cursor::new(body))),
        }
    }
}

/// Reader that errors once `remaining` bytes have been served.
struct BrokenStream {
    inner: Cursor<Arc<[u8]>>,
    remaining: usize,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        let max = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_and_body() {
        let tile = TileCoordinate::new(46, 11);
        let store = MemoryTileStore::new().with_tile(tile, 1000);

        assert_eq!(store.object_size(&tile.remote_key()).unwrap(), 1000);

        let mut body = Vec::new();
        store
            .open_object(&tile.remote_key())
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body.len(), 1000);
        assert_eq!(store.head_calls(), 1);
        assert_eq!(store.get_calls(), 1);
    }

    #[test]
    fn test_missing_object() {
        let store = MemoryTileStore::new();
        assert!(matches!(
            store.object_size("nope"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.open_object("nope"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_failing_probe_still_serves_body() {
        let tile = TileCoordinate::new(1, 2);
        let store = MemoryTileStore::new()
            .with_tile(tile, 10)
            .with_failing_probe(tile);

        assert!(store.object_size(&tile.remote_key()).is_err());
        assert!(store.open_object(&tile.remote_key()).is_ok());
    }

    #[test]
    fn test_broken_stream() {
        let tile = TileCoordinate::new(1, 2);
        let store = MemoryTileStore::new()
            .with_tile(tile, 100)
            .with_broken_stream(tile, 40);

        let mut body = Vec::new();
        let err = store
            .open_object(&tile.remote_key())
            .unwrap()
            .read_to_end(&mut body)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(body.len(), 40);
    }
}
