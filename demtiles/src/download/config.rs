//! Configuration for the download engine.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Bytes read from the remote stream between cancellation checks (1 MiB).
///
/// Worst-case cancellation latency is one chunk transfer.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Suffix appended to a tile's file name while it is being written.
pub const DEFAULT_PARTIAL_SUFFIX: &str = ".part";

/// Configuration for the download engine.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Bytes per streaming read.
    pub chunk_size: usize,

    /// Suffix of in-flight files.
    pub partial_suffix: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            partial_suffix: DEFAULT_PARTIAL_SUFFIX.to_string(),
        }
    }
}

impl DownloaderConfig {
    /// Set the chunk size (minimum 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the in-flight file suffix.
    pub fn with_partial_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.partial_suffix = suffix.into();
        self
    }

    /// Path a tile is written to before it is complete.
    pub fn partial_path(&self, dest: &Path) -> PathBuf {
        let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
        name.push(&self.partial_suffix);
        dest.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloaderConfig::default();
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.partial_suffix, ".part");
    }

    #[test]
    fn test_min_chunk_size() {
        let config = DownloaderConfig::default().with_chunk_size(0);
        assert_eq!(config.chunk_size, 1);
    }

    #[test]
    fn test_partial_path() {
        let config = DownloaderConfig::default();
        assert_eq!(
            config.partial_path(Path::new("/dem/tile.tif")),
            PathBuf::from("/dem/tile.tif.part")
        );

        let config = config.with_partial_suffix(".tmp");
        assert_eq!(
            config.partial_path(Path::new("/dem/tile.tif")),
            PathBuf::from("/dem/tile.tif.tmp")
        );
    }
}
