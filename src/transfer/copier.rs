// ABOUTME: Copies one table from source to destination in checkpointed batches
// ABOUTME: Cancellation is only observed between batches, never during a write

use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::error::TransferError;
use crate::progress::TableProgress;
use crate::store::{DestinationStore, RowBatch, SourceStore};
use crate::transform::normalize_rows;
use tokio_util::sync::CancellationToken;

/// How a single table's copy ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Completed,
    /// Stopped at a batch boundary; the table stays `in_progress` and resumable
    Cancelled,
    Failed(TransferError),
}

/// Everything a table copy needs besides the table itself
pub struct CopyContext<'a> {
    pub source: &'a dyn SourceStore,
    pub destination: &'a dyn DestinationStore,
    pub checkpoints: &'a dyn CheckpointStore,
    /// Hash of the destination URL, stored with every checkpoint
    pub destination_hash: &'a str,
    pub batch_size: usize,
    pub cancel: &'a CancellationToken,
}

impl CopyContext<'_> {
    fn save(&self, progress: &TableProgress) -> Result<(), TransferError> {
        self.checkpoints
            .save(&CheckpointRecord::from_progress(progress, self.destination_hash))
            .map_err(TransferError::checkpoint)
    }
}

/// Copy `progress.table_name` starting strictly after `progress.cursor`
///
/// Per batch: read, normalize, upsert (one destination transaction), then
/// advance the in-memory progress, save the checkpoint, and call
/// `on_progress`. A crash between the upsert and the save replays at most
/// that one batch, which the upsert absorbs.
///
/// # Arguments
///
/// * `progress` - Table state to advance; updated in place
/// * `ctx` - Stores, batch size, and cancellation token
/// * `on_progress` - Called after every checkpoint save and status change
pub async fn copy_table(
    progress: &mut TableProgress,
    ctx: &CopyContext<'_>,
    on_progress: &mut (dyn FnMut(&TableProgress) + Send),
) -> CopyOutcome {
    if progress.is_completed() {
        return CopyOutcome::Completed;
    }

    let table = progress.table_name.clone();
    let batch_size = ctx.batch_size.max(1);

    progress.mark_in_progress();
    if let Err(e) = ctx.save(progress) {
        return fail(progress, ctx, on_progress, e);
    }
    on_progress(progress);

    tracing::info!(
        "Copying '{}' ({} of {} rows already transferred)",
        table,
        progress.transferred_rows,
        progress.total_rows
    );

    loop {
        if ctx.cancel.is_cancelled() {
            tracing::info!(
                "Cancelled '{}' after {} rows; resumable from {:?}",
                table,
                progress.transferred_rows,
                progress.cursor
            );
            return CopyOutcome::Cancelled;
        }

        let batch = match ctx
            .source
            .read_rows_after(&table, &progress.cursor, batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                let err = TransferError::BatchReadFailure {
                    table: table.clone(),
                    reason: TransferError::chain(&e),
                };
                return fail(progress, ctx, on_progress, err);
            }
        };

        if batch.is_empty() {
            break;
        }

        let RowBatch {
            columns,
            mut rows,
            next,
        } = batch;
        let count = rows.len() as u64;
        normalize_rows(&columns, &mut rows);

        if let Err(e) = ctx.destination.upsert_rows(&table, &columns, rows).await {
            let err = TransferError::BatchWriteFailure {
                table: table.clone(),
                reason: TransferError::chain(&e),
            };
            return fail(progress, ctx, on_progress, err);
        }

        if let Err(e) = progress.record_batch(count, next) {
            let err = TransferError::BatchReadFailure {
                table: table.clone(),
                reason: TransferError::chain(&e),
            };
            return fail(progress, ctx, on_progress, err);
        }

        if let Err(e) = ctx.save(progress) {
            return fail(progress, ctx, on_progress, e);
        }

        tracing::debug!(
            "'{}': {} rows committed ({}/{})",
            table,
            count,
            progress.transferred_rows,
            progress.total_rows
        );
        on_progress(progress);
    }

    progress.mark_completed();
    if let Err(e) = ctx.save(progress) {
        return fail(progress, ctx, on_progress, e);
    }
    on_progress(progress);

    tracing::info!("Completed '{}' ({} rows)", table, progress.transferred_rows);
    CopyOutcome::Completed
}

fn fail(
    progress: &mut TableProgress,
    ctx: &CopyContext<'_>,
    on_progress: &mut (dyn FnMut(&TableProgress) + Send),
    err: TransferError,
) -> CopyOutcome {
    tracing::error!("Table '{}' failed: {}", progress.table_name, err);

    progress.mark_failed(err.to_string());
    if let Err(save_err) = ctx.save(progress) {
        tracing::warn!(
            "Could not record failure of '{}': {}",
            progress.table_name,
            save_err
        );
    }
    on_progress(progress);

    CopyOutcome::Failed(err)
}
