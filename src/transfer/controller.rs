// ABOUTME: Transfer controller owning the single background copy job
// ABOUTME: Start/cancel/status/reset over one shared progress board and listener set

use super::copier::{copy_table, CopyContext, CopyOutcome};
use super::DEFAULT_BATCH_SIZE;
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::error::{TransferError, TransferResult};
use crate::plan::{build_plan, merge_checkpoints, select_tables};
use crate::progress::{JobState, ProgressEvent, ProgressListener, TableProgress, TransferSnapshot};
use crate::store::{DestinationConnector, DestinationStore, SourceStore};
use crate::utils::{hash_string, mask_url};
use chrono::{DateTime, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tunables for a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub batch_size: usize,
    /// Restrict the transfer to these tables; `None` copies every known table
    pub tables: Option<Vec<String>>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tables: None,
        }
    }
}

/// The one transfer job this process may run
struct JobSlot {
    state: JobState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    /// Masked destination URL, for logs only
    destination: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

struct Shared {
    source: Arc<dyn SourceStore>,
    connector: Arc<dyn DestinationConnector>,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: TransferSettings,
    job: Mutex<JobSlot>,
    tables: RwLock<Vec<TableProgress>>,
    listeners: RwLock<Vec<Arc<dyn ProgressListener>>>,
}

impl Shared {
    fn lock_job(&self) -> MutexGuard<'_, JobSlot> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job_state(&self) -> JobState {
        self.lock_job().state
    }

    fn tables(&self) -> Vec<TableProgress> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_tables(&self, tables: Vec<TableProgress>) {
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = tables;
    }

    fn snapshot(&self) -> TransferSnapshot {
        let state = self.job_state();
        TransferSnapshot::new(state, self.tables())
    }

    /// Record a table's new state on the board and notify listeners
    fn publish(&self, progress: &TableProgress) {
        {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = tables
                .iter_mut()
                .find(|t| t.table_name == progress.table_name)
            {
                *slot = progress.clone();
            }
        }

        let snapshot = self.snapshot();
        self.emit(&ProgressEvent::for_table(&snapshot, progress));
    }

    fn emit(&self, event: &ProgressEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_progress(event))).is_err() {
                tracing::warn!("Progress listener panicked; continuing transfer");
            }
        }
    }
}

/// Runs at most one transfer at a time and reports on it
///
/// Cloning is cheap; all clones drive the same job.
#[derive(Clone)]
pub struct TransferController {
    shared: Arc<Shared>,
}

impl TransferController {
    pub fn new(
        source: Arc<dyn SourceStore>,
        connector: Arc<dyn DestinationConnector>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                connector,
                checkpoints,
                settings,
                job: Mutex::new(JobSlot {
                    state: JobState::Idle,
                    cancel: CancellationToken::new(),
                    handle: None,
                    destination: None,
                    started_at: None,
                }),
                tables: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.shared.settings
    }

    /// Register a listener for every subsequent progress event
    pub fn add_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Start or resume a transfer into `destination_url`
    ///
    /// Connects, loads checkpoints, plans, and prepares the destination schema
    /// before returning; the copy itself runs on a background task.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a transfer is active (no state change)
    /// - `InvalidConfig`, `DestinationUnreachable`, `CheckpointFailure`,
    ///   `SourceUnavailable`, `SchemaSetup` from preparation; the job state is
    ///   left as it was
    pub async fn start(&self, destination_url: &str) -> TransferResult<()> {
        let (previous, cancel) = {
            let mut job = self.shared.lock_job();
            if matches!(job.state, JobState::Running | JobState::Cancelling) {
                return Err(TransferError::AlreadyRunning);
            }
            let previous = job.state;
            job.state = JobState::Running;
            job.cancel = CancellationToken::new();
            job.handle = None;
            job.destination = Some(mask_url(destination_url));
            job.started_at = Some(Utc::now());
            (previous, job.cancel.clone())
        };

        let (destination, destination_hash, plan) = match self.prepare(destination_url).await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!("Transfer not started: {}", e);
                self.shared.lock_job().state = previous;
                return Err(e);
            }
        };

        self.shared.replace_tables(plan);

        let handle = tokio::spawn(run_copy_loop(
            Arc::clone(&self.shared),
            destination,
            destination_hash,
            cancel,
        ));
        self.shared.lock_job().handle = Some(handle);

        Ok(())
    }

    async fn prepare(
        &self,
        destination_url: &str,
    ) -> TransferResult<(Box<dyn DestinationStore>, String, Vec<TableProgress>)> {
        let tables = select_tables(self.shared.settings.tables.as_deref())?;
        let normalized = self
            .shared
            .connector
            .normalize(destination_url)
            .map_err(TransferError::destination_unreachable)?;
        let destination_hash = hash_string(&normalized);

        tracing::info!("Transfer starting → {}", mask_url(&normalized));

        let destination = self
            .shared
            .connector
            .connect(&normalized)
            .await
            .map_err(TransferError::destination_unreachable)?;

        match self
            .plan_against(destination.as_ref(), &tables, &destination_hash)
            .await
        {
            Ok(plan) => Ok((destination, destination_hash, plan)),
            Err(e) => {
                close_quietly(destination.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn plan_against(
        &self,
        destination: &dyn DestinationStore,
        tables: &[String],
        destination_hash: &str,
    ) -> TransferResult<Vec<TableProgress>> {
        let shared = &self.shared;

        let existing = destination
            .list_tables()
            .await
            .map_err(TransferError::destination_unreachable)?;
        tracing::debug!("Destination reachable ({} tables found)", existing.len());

        let mut records = shared
            .checkpoints
            .load()
            .map_err(TransferError::checkpoint)?;
        // Records without a destination predate binding and adopt this one
        if records
            .iter()
            .any(|r| !r.destination.is_empty() && r.destination != destination_hash)
        {
            tracing::warn!(
                "Saved progress was made against a different destination; starting over"
            );
            shared
                .checkpoints
                .reset()
                .map_err(TransferError::checkpoint)?;
            records.clear();
        }

        let plan = build_plan(shared.source.as_ref(), tables).await?;
        let plan = merge_checkpoints(plan, &records);

        let names: Vec<String> = plan.iter().map(|t| t.table_name.clone()).collect();
        destination
            .ensure_schema(&names)
            .await
            .map_err(|e| TransferError::SchemaSetup(TransferError::chain(&e)))?;

        for progress in &plan {
            shared
                .checkpoints
                .save(&CheckpointRecord::from_progress(progress, destination_hash))
                .map_err(TransferError::checkpoint)?;
        }

        Ok(plan)
    }

    /// Ask the running transfer to stop after its current batch
    ///
    /// Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let mut job = self.shared.lock_job();
        if job.state != JobState::Running {
            return false;
        }
        job.state = JobState::Cancelling;
        job.cancel.cancel();
        tracing::info!("Cancellation requested; stopping after the current batch");
        true
    }

    /// Current snapshot; falls back to saved checkpoints when no job has run
    ///
    /// Saved checkpoints are narrowed to the configured table selection.
    pub fn status(&self) -> TransferSnapshot {
        let state = self.shared.job_state();
        if state != JobState::Idle {
            return self.shared.snapshot();
        }

        let records = match self.shared.checkpoints.load() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not read saved progress: {:#}", e);
                Vec::new()
            }
        };

        // Report only what the next start would plan
        let tables = match select_tables(self.shared.settings.tables.as_deref()) {
            Ok(selected) => records
                .iter()
                .filter(|r| selected.contains(&r.table_name))
                .map(CheckpointRecord::to_progress)
                .collect(),
            Err(_) => records.iter().map(CheckpointRecord::to_progress).collect(),
        };
        TransferSnapshot::new(state, tables)
    }

    /// Forget all saved progress so the next start copies from scratch
    pub fn reset(&self) -> TransferResult<()> {
        let mut job = self.shared.lock_job();
        if matches!(job.state, JobState::Running | JobState::Cancelling) {
            return Err(TransferError::AlreadyRunning);
        }

        self.shared
            .checkpoints
            .reset()
            .map_err(TransferError::checkpoint)?;
        self.shared.replace_tables(Vec::new());
        job.state = JobState::Idle;

        tracing::info!("Transfer progress reset");
        Ok(())
    }

    /// Wait for the background task, if any, and return the final snapshot
    pub async fn wait(&self) -> TransferSnapshot {
        let handle = self.shared.lock_job().handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Transfer task ended abnormally: {}", e);
                self.shared.lock_job().state = JobState::Failed;
            }
        }
        self.status()
    }

    /// Connect to `url` and list its tables without touching any progress
    pub async fn test_connection(&self, url: &str) -> TransferResult<Vec<String>> {
        let destination = self
            .shared
            .connector
            .connect(url)
            .await
            .map_err(TransferError::destination_unreachable)?;

        let tables = destination
            .list_tables()
            .await
            .map_err(TransferError::destination_unreachable);
        close_quietly(destination.as_ref()).await;
        tables
    }
}

async fn close_quietly(destination: &dyn DestinationStore) {
    if let Err(e) = destination.close().await {
        tracing::warn!("Failed to close destination connection: {:#}", e);
    }
}

/// Copy every planned table in order, stopping at the first failure
async fn run_copy_loop(
    shared: Arc<Shared>,
    destination: Box<dyn DestinationStore>,
    destination_hash: String,
    cancel: CancellationToken,
) {
    let ctx = CopyContext {
        source: shared.source.as_ref(),
        destination: destination.as_ref(),
        checkpoints: shared.checkpoints.as_ref(),
        destination_hash: &destination_hash,
        batch_size: shared.settings.batch_size,
        cancel: &cancel,
    };

    let mut failure = None;
    let table_count = shared.tables().len();

    for index in 0..table_count {
        let Some(mut progress) = shared.tables().get(index).cloned() else {
            break;
        };
        if progress.is_completed() {
            shared.publish(&progress);
            continue;
        }
        if cancel.is_cancelled() {
            break;
        }

        let mut publish = |p: &TableProgress| shared.publish(p);
        match copy_table(&mut progress, &ctx, &mut publish).await {
            CopyOutcome::Completed => {}
            CopyOutcome::Cancelled => break,
            CopyOutcome::Failed(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    close_quietly(destination.as_ref()).await;

    let all_completed = shared.tables().iter().all(TableProgress::is_completed);
    let final_state = match (&failure, all_completed) {
        (Some(_), _) => JobState::Failed,
        (None, true) => JobState::Completed,
        (None, false) => JobState::Cancelled,
    };

    {
        let mut job = shared.lock_job();
        job.state = final_state;

        let target = job.destination.as_deref().unwrap_or("destination");
        let elapsed = job
            .started_at
            .map(|t| (Utc::now() - t).num_seconds())
            .unwrap_or(0);
        match final_state {
            JobState::Completed => {
                tracing::info!("Transfer to {} completed in {}s", target, elapsed)
            }
            JobState::Cancelled => tracing::info!("Transfer to {} paused; can be resumed", target),
            _ => tracing::error!("Transfer to {} failed after {}s", target, elapsed),
        }
    }

    let snapshot = shared.snapshot();
    shared.emit(&ProgressEvent::summary(&snapshot));
    if let Some(err) = failure {
        shared.emit(&ProgressEvent::error(err.to_string()));
    }
}
