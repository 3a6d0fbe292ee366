//! demtiles - Copernicus DEM GLO-30 tile downloader
//!
//! This library maps 1°×1° tile coordinates to objects in the public
//! `copernicus-dem-30m` bucket and downloads them on a background worker
//! with chunked streaming, cooperative cancellation, and progress reporting.
//!
//! - [`tile`]: coordinates, key naming, bounding boxes, selections
//! - [`store`]: the remote object store (S3 over HTTPS, or in memory)
//! - [`download`]: jobs, the download engine, and its controller
//! - [`logging`]: `tracing` subscriber setup and the engine's log sink

pub mod download;
pub mod logging;
pub mod store;
pub mod tile;
