//! List command - print the tiles covering a bounding box.

use super::bbox_selection;
use crate::error::CliError;

/// Run the list command.
pub fn run(bbox: &[f64]) -> Result<(), CliError> {
    let selection = bbox_selection(bbox)?;

    eprintln!(
        "Found {} tiles for bounding box [{}]",
        selection.len(),
        bbox.iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    for tile in &selection {
        println!("{}", tile.remote_key());
    }
    Ok(())
}
