// ABOUTME: status command: prints saved transfer progress for a source database
// ABOUTME: Reads checkpoints only, so it works while no transfer is running

use crate::api::TransferStatusResponse;
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::progress::{JobState, TransferSnapshot};
use anyhow::{Context, Result};

/// Print progress as a table, or as JSON when `json` is set
pub fn status(checkpoints: &dyn CheckpointStore, json: bool) -> Result<()> {
    let records = checkpoints.load().context("Failed to read saved progress")?;
    let snapshot = TransferSnapshot::new(
        JobState::Idle,
        records.iter().map(CheckpointRecord::to_progress).collect(),
    );
    let response = TransferStatusResponse::from(&snapshot);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to encode status")?
        );
        return Ok(());
    }

    if response.tables.is_empty() {
        println!("No transfer progress recorded.");
        return Ok(());
    }

    println!(
        "Overall: {}% ({}/{} rows) [{}]",
        response.overall_percent,
        response.transferred_rows,
        response.total_rows,
        response.state.as_str()
    );
    println!();
    println!(
        "{:<34} {:<12} {:>5} {:>12} {:>12}",
        "TABLE", "STATUS", "PCT", "COPIED", "TOTAL"
    );
    for table in &response.tables {
        println!(
            "{:<34} {:<12} {:>4}% {:>12} {:>12}",
            table.table_name,
            table.status.as_str(),
            table.percent,
            table.transferred_rows,
            table.total_rows
        );
        if let Some(error) = &table.last_error {
            println!("    error: {}", error);
        }
    }

    Ok(())
}
