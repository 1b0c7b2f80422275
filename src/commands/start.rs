// ABOUTME: start command: runs a transfer in the foreground with a progress bar
// ABOUTME: Ctrl-C requests cooperative cancellation; rerunning resumes

use super::reset::confirm;
use crate::progress::{FnListener, OverallState, ProgressEvent, TableStatus};
use crate::transfer::TransferController;
use crate::utils::mask_url;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

fn create_progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% ({eta})")
            .context("Failed to create progress template")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Start or resume a transfer into `target` and wait for it to end
///
/// # Arguments
///
/// * `controller` - Controller wired to the source and checkpoint store
/// * `target` - Destination MySQL URL
/// * `fresh` - Discard saved progress first
/// * `yes` - Skip the confirmation that `fresh` asks for
pub async fn start(controller: TransferController, target: &str, fresh: bool, yes: bool) -> Result<()> {
    if fresh {
        confirm("Discard saved progress and copy every table again?", yes)?;
        controller.reset()?;
    }

    let pb = create_progress_bar()?;
    let bar = pb.clone();
    controller.add_listener(Arc::new(FnListener(move |event: &ProgressEvent| {
        if let ProgressEvent::Progress {
            table,
            percent,
            transferred,
            total,
            overall_percent,
            ..
        } = event
        {
            bar.set_position(u64::from(*overall_percent));
            if let Some(table) = table {
                bar.set_message(format!("{}: {}% ({}/{})", table, percent, transferred, total));
            }
        }
    })));

    tracing::info!("Starting transfer to {}", mask_url(target));
    controller.start(target).await?;

    let interrupt = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && controller.cancel() {
                tracing::warn!("Interrupted; finishing the current batch before stopping");
            }
        })
    };

    let snapshot = controller.wait().await;
    interrupt.abort();
    pb.finish_and_clear();

    match snapshot.state {
        OverallState::Completed => {
            tracing::info!(
                "✓ Transfer complete: {} rows across {} tables",
                snapshot.transferred_rows,
                snapshot.tables.len()
            );
            Ok(())
        }
        OverallState::Failed => {
            let failed = snapshot
                .tables
                .iter()
                .find(|t| t.status == TableStatus::Failed);
            match failed {
                Some(table) => bail!(
                    "Transfer failed on '{}': {}",
                    table.table_name,
                    table.last_error.as_deref().unwrap_or("unknown error")
                ),
                None => bail!("Transfer failed"),
            }
        }
        _ => {
            tracing::warn!(
                "⚠ Transfer paused at {}%; run start again to resume",
                snapshot.overall_percent
            );
            Ok(())
        }
    }
}
