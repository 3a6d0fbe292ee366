//! Download command - fetch the tiles covering a bounding box.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use demtiles::download::{
    existing_tiles, DownloadController, DownloadJob, JobReport, JobStatus, OverwritePolicy,
};
use demtiles::logging::LogSink;
use demtiles::store::S3Config;
use demtiles::tile::{TileCoordinate, TileSelection};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use indicatif::HumanBytes;
use tracing::info;

use super::bbox_selection;
use crate::error::CliError;
use crate::ui::CliReporter;

/// Options for the download command.
pub struct DownloadOptions {
    pub bbox: Option<Vec<f64>>,
    pub tiles: Vec<TileCoordinate>,
    pub output: PathBuf,
    pub overwrite: bool,
    pub skip_existing: bool,
}

/// Run the download command.
pub fn run(opts: DownloadOptions) -> Result<(), CliError> {
    let selection = collect_tiles(opts.bbox.as_deref(), &opts.tiles)?;

    println!(
        "{} {} tile(s) into {}",
        style("Downloading").bold(),
        selection.len(),
        opts.output.display()
    );

    let Some(policy) = resolve_policy(&opts, &selection)? else {
        println!("Download cancelled.");
        return Ok(());
    };
    info!(
        tiles = selection.len(),
        directory = %opts.output.display(),
        policy = %policy,
        "Starting download"
    );

    let reporter = Arc::new(CliReporter::new());
    let controller = Arc::new(DownloadController::new(
        Arc::new(S3Config::default()),
        reporter,
        LogSink::current(),
    ));

    let weak = Arc::downgrade(&controller);
    ctrlc::set_handler(move || {
        if let Some(controller) = weak.upgrade() {
            controller.stop();
        }
    })?;

    controller.start(DownloadJob::from_selection(&selection, &opts.output, policy))?;
    let report = controller.wait().ok_or(CliError::WorkerLost)?;

    print_summary(&report);
    into_result(report)
}

/// Tiles from the bounding box plus any `--tile` arguments.
fn collect_tiles(
    bbox: Option<&[f64]>,
    extra: &[TileCoordinate],
) -> Result<TileSelection, CliError> {
    let mut selection = match bbox {
        Some(values) => bbox_selection(values)?,
        None => TileSelection::new(),
    };
    for tile in extra {
        selection.select(*tile);
    }

    if selection.is_empty() {
        return Err(CliError::NoTiles);
    }
    Ok(selection)
}

/// Decide what to do with tiles that already exist locally.
///
/// Returns `None` when the user cancels at the prompt.
fn resolve_policy(
    opts: &DownloadOptions,
    selection: &TileSelection,
) -> Result<Option<OverwritePolicy>, CliError> {
    if opts.overwrite {
        return Ok(Some(OverwritePolicy::Overwrite));
    }
    if opts.skip_existing {
        return Ok(Some(OverwritePolicy::Skip));
    }

    let existing = existing_tiles(&opts.output, selection);
    if existing.is_empty() {
        return Ok(Some(OverwritePolicy::Overwrite));
    }
    if !std::io::stdin().is_terminal() {
        eprintln!(
            "{} of the selected tiles already exist, skipping them",
            existing.len()
        );
        return Ok(Some(OverwritePolicy::Skip));
    }

    prompt_policy(existing.len(), &opts.output)
}

fn prompt_policy(existing: usize, directory: &Path) -> Result<Option<OverwritePolicy>, CliError> {
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "{} of the selected tiles already exist in {}",
            existing,
            directory.display()
        ))
        .items(&["Overwrite all", "Skip existing", "Cancel download"])
        .default(1)
        .interact_opt()?;

    Ok(match choice {
        Some(0) => Some(OverwritePolicy::Overwrite),
        Some(1) => Some(OverwritePolicy::Skip),
        _ => None,
    })
}

fn print_summary(report: &JobReport) {
    println!();
    let headline = report.status.message();
    match report.status {
        JobStatus::Completed if report.failed_count() == 0 => {
            println!("{}", style(headline).green().bold())
        }
        JobStatus::Completed => println!("{}", style(headline).yellow().bold()),
        _ => println!("{}", style(headline).red().bold()),
    }

    println!("  Downloaded: {}", report.completed_count());
    println!("  Skipped:    {}", report.skipped_count());
    println!("  Failed:     {}", report.failed_count());
    println!("  Transferred {}", HumanBytes(report.bytes_downloaded));

    for (tile, failure) in report.failures() {
        println!("  {} {}: {}", style("x").red(), tile, failure);
    }
}

fn into_result(report: JobReport) -> Result<(), CliError> {
    let failed = report.failed_count();
    match report.status {
        JobStatus::Cancelled => Err(CliError::Cancelled),
        JobStatus::CriticalFailure(err) => Err(CliError::Critical(err)),
        JobStatus::Completed => match failed {
            0 => Ok(()),
            n => Err(CliError::TileFailures(n)),
        },
    }
}
