// ABOUTME: Durable per-table checkpoints for resumable transfers
// ABOUTME: JSON file backend with atomic rewrites; SQLite backend lives in sqlite::checkpoint

use crate::progress::{Cursor, TableProgress, TableStatus};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CHECKPOINT_VERSION: u32 = 1;

/// Persisted mirror of a `TableProgress`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub table_name: String,
    pub total_rows: u64,
    pub transferred_rows: u64,
    pub cursor: Cursor,
    pub status: TableStatus,
    pub last_error: Option<String>,
    /// Hash of the destination URL this progress was made against
    pub destination: String,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn from_progress(progress: &TableProgress, destination: &str) -> Self {
        Self {
            table_name: progress.table_name.clone(),
            total_rows: progress.total_rows,
            transferred_rows: progress.transferred_rows,
            cursor: progress.cursor,
            status: progress.status,
            last_error: progress.last_error.clone(),
            destination: destination.to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn to_progress(&self) -> TableProgress {
        TableProgress {
            table_name: self.table_name.clone(),
            total_rows: self.total_rows,
            transferred_rows: self.transferred_rows,
            cursor: self.cursor,
            status: self.status,
            last_error: self.last_error.clone(),
        }
    }
}

/// Durable source of truth for transfer progress
///
/// Implementations must make `save` durable before returning and must be
/// safe to call from the copy task while status readers call `load`.
pub trait CheckpointStore: Send + Sync {
    /// All records in the order they were first saved; empty on a fresh start
    fn load(&self) -> Result<Vec<CheckpointRecord>>;

    /// Insert or replace the record for `record.table_name`
    fn save(&self, record: &CheckpointRecord) -> Result<()>;

    /// Forget all progress
    fn reset(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheckpointData {
    version: u32,
    tables: Vec<CheckpointRecord>,
}

/// Checkpoints stored as one JSON document
///
/// Every save rewrites the file through a temp file in the same directory
/// followed by a rename, so readers never observe a torn document.
pub struct JsonCheckpointStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CheckpointData> {
        if !self.path.exists() {
            return Ok(CheckpointData {
                version: CHECKPOINT_VERSION,
                tables: Vec::new(),
            });
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint at {}", self.path.display()))?;
        let data: CheckpointData = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse checkpoint JSON at {}", self.path.display())
        })?;

        if data.version != CHECKPOINT_VERSION {
            bail!(
                "Checkpoint version mismatch (found {}, expected {}). Run with --reset to start fresh.",
                data.version,
                CHECKPOINT_VERSION
            );
        }

        Ok(data)
    }

    fn write(&self, data: &CheckpointData) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create checkpoint directory {}", parent.display())
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp checkpoint in {}", parent.display()))?;

        serde_json::to_writer_pretty(tmp.as_file_mut(), data).with_context(|| {
            format!("Failed to serialize checkpoint at {}", self.path.display())
        })?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync checkpoint at {}", self.path.display()))?;

        tmp.persist(&self.path)
            .with_context(|| format!("Failed to persist checkpoint at {}", self.path.display()))?;

        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> Result<Vec<CheckpointRecord>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.tables)
    }

    fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut data = self.read()?;

        match data
            .tables
            .iter_mut()
            .find(|r| r.table_name == record.table_name)
        {
            Some(existing) => *existing = record.clone(),
            None => data.tables.push(record.clone()),
        }

        self.write(&data)
    }

    fn reset(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove checkpoint at {}", self.path.display())
            })?;
        }
        Ok(())
    }
}

/// Default checkpoint location for a given source database
///
/// Deterministic per source so that a later `status` or `start` finds the
/// same file without knowing the destination.
pub fn checkpoint_path(source_path: &str) -> Result<PathBuf> {
    let base = std::env::temp_dir().join("db-transfer-checkpoints");
    fs::create_dir_all(&base).with_context(|| {
        format!(
            "Failed to create checkpoint base directory {}",
            base.display()
        )
    })?;

    let source = fs::canonicalize(source_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| source_path.to_string());
    let digest = crate::utils::hash_string(&source);
    let short = &digest[..16.min(digest.len())];

    Ok(base.join(format!("transfer-{}.json", short)))
}
