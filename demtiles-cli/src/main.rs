//! demtiles CLI - Copernicus DEM GLO-30 tile downloader
//!
//! Lists or downloads the 1°×1° elevation tiles covering a bounding box.

mod commands;
mod error;
mod ui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use demtiles::logging::{self, LogConfig, LoggingGuard};
use demtiles::tile::TileCoordinate;

use crate::commands::download::DownloadOptions;
use crate::error::CliError;

/// Default output directory for downloaded tiles.
const DEFAULT_OUTPUT_DIR: &str = "copernicus_dem_tiles";

#[derive(Parser)]
#[command(name = "demtiles")]
#[command(version, about = "Download Copernicus DEM GLO-30 tiles from AWS for a bounding box")]
struct Cli {
    /// Log debug output to the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the remote keys of the tiles covering a bounding box
    List(ListArgs),

    /// Download the tiles covering a bounding box
    Download(DownloadArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Bounding box: MIN_LON MIN_LAT MAX_LON MAX_LAT (e.g. 11.8 46.5 12.2 46.7)
    #[arg(
        num_args = 4,
        required = true,
        value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"],
        allow_negative_numbers = true
    )]
    bbox: Vec<f64>,
}

#[derive(Args)]
struct DownloadArgs {
    /// Bounding box: MIN_LON MIN_LAT MAX_LON MAX_LAT (e.g. 11.8 46.5 12.2 46.7)
    #[arg(
        num_args = 4,
        value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"],
        allow_negative_numbers = true
    )]
    bbox: Option<Vec<f64>>,

    /// Output directory for downloaded tiles
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Add a single tile by its south-west corner (repeatable)
    #[arg(
        long = "tile",
        value_name = "LAT,LON",
        value_parser = parse_tile,
        allow_hyphen_values = true
    )]
    tiles: Vec<TileCoordinate>,

    /// Replace tiles that already exist locally
    #[arg(long, conflicts_with = "skip_existing")]
    overwrite: bool,

    /// Keep tiles that already exist locally
    #[arg(long)]
    skip_existing: bool,
}

/// Parse `LAT,LON` into a tile coordinate.
fn parse_tile(s: &str) -> Result<TileCoordinate, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", s))?;
    let lat = lat
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid latitude '{}': {}", lat.trim(), e))?;
    let lon = lon
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid longitude '{}': {}", lon.trim(), e))?;

    let tile = TileCoordinate::new(lat, lon);
    if !tile.is_on_grid() {
        return Err(format!("tile {} is outside the global grid", tile));
    }
    Ok(tile)
}

fn init_logging(verbose: bool) -> Option<LoggingGuard> {
    let filter = if verbose { "debug" } else { "info" };
    match logging::init(&LogConfig::default().with_default_filter(filter)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: file logging disabled: {}", e);
            None
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::List(args) => commands::list::run(&args.bbox),
        Commands::Download(args) => commands::download::run(DownloadOptions {
            bbox: args.bbox,
            tiles: args.tiles,
            output: args.output,
            overwrite: args.overwrite,
            skip_existing: args.skip_existing,
        }),
    }
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "demtiles starting");

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tile() {
        assert_eq!(parse_tile("46,11").unwrap(), TileCoordinate::new(46, 11));
        assert_eq!(parse_tile("-3, -7").unwrap(), TileCoordinate::new(-3, -7));
        assert!(parse_tile("46").is_err());
        assert!(parse_tile("46,east").is_err());
        assert!(parse_tile("90,0").is_err());
    }

    #[test]
    fn test_download_args() {
        let cli = Cli::try_parse_from([
            "demtiles",
            "download",
            "11.8",
            "46.5",
            "12.2",
            "46.7",
            "-o",
            "out",
            "--tile",
            "-3,-7",
            "--skip-existing",
        ])
        .unwrap();

        let Commands::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.bbox, Some(vec![11.8, 46.5, 12.2, 46.7]));
        assert_eq!(args.output, PathBuf::from("out"));
        assert_eq!(args.tiles, vec![TileCoordinate::new(-3, -7)]);
        assert!(args.skip_existing);
        assert!(!args.overwrite);
    }

    #[test]
    fn test_overwrite_conflicts_with_skip() {
        let result = Cli::try_parse_from([
            "demtiles",
            "download",
            "--tile",
            "46,11",
            "--overwrite",
            "--skip-existing",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_negative_bbox() {
        let cli =
            Cli::try_parse_from(["demtiles", "list", "-7.5", "-3.5", "-6.5", "-2.5"]).unwrap();
        let Commands::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.bbox, vec![-7.5, -3.5, -6.5, -2.5]);
    }
}
