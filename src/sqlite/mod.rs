// ABOUTME: SQLite source store for transfers out of the local database
// ABOUTME: Provides path validation, read-only connections, and the SourceStore implementation

pub mod checkpoint;
pub mod converter;
pub mod reader;

use crate::progress::Cursor;
use crate::store::{RowBatch, SourceStore};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub use checkpoint::SqliteCheckpointStore;

/// Validate a SQLite file path to prevent path traversal attacks
///
/// Security checks:
/// - Canonicalizes path to resolve symlinks and relative paths
/// - Verifies file exists and is a regular file (not directory)
/// - Checks file extension is .db, .sqlite, or .sqlite3
///
/// # Returns
///
/// Canonicalized absolute path if valid, error otherwise
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let path_buf = PathBuf::from(path);

    // Canonicalize also validates that the file exists
    let canonical = path_buf.canonicalize().with_context(|| {
        format!(
            "Failed to resolve SQLite file path '{}'. \
             File may not exist or may not be readable.",
            path
        )
    })?;

    if !canonical.is_file() {
        bail!("Path '{}' is not a regular file (may be a directory)", path);
    }

    if let Some(ext) = canonical.extension() {
        let ext_str = ext.to_str().unwrap_or("");
        if !["db", "sqlite", "sqlite3"].contains(&ext_str) {
            bail!(
                "Invalid SQLite file extension '{}'. \
                 Must be .db, .sqlite, or .sqlite3",
                ext_str
            );
        }
    } else {
        bail!(
            "SQLite file '{}' has no extension. \
             Must be .db, .sqlite, or .sqlite3",
            path
        );
    }

    tracing::debug!("Validated SQLite path: {}", canonical.display());

    Ok(canonical)
}

/// Open a SQLite database in read-only mode
///
/// The transfer never writes to its source, so the connection is opened with
/// `SQLITE_OPEN_READ_ONLY` and verified with a trivial query.
pub fn open_sqlite(path: &str) -> Result<Connection> {
    let canonical = validate_sqlite_path(path)?;

    tracing::info!("Opening SQLite database: {}", canonical.display());

    let conn = Connection::open_with_flags(
        &canonical,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open SQLite database: {}", canonical.display()))?;

    let _version: String = conn
        .query_row("SELECT sqlite_version()", [], |row| row.get(0))
        .context("Failed to query SQLite version (database may be corrupted)")?;

    tracing::debug!("Successfully opened SQLite database");

    Ok(conn)
}

/// Local SQLite database as a transfer source
///
/// rusqlite is blocking, so every call runs on the blocking thread pool with
/// the connection behind a mutex.
#[derive(Clone)]
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSource {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::from_connection(open_sqlite(path)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&guard)
        })
        .await
        .context("SQLite worker task failed")?
    }
}

#[async_trait]
impl SourceStore for SqliteSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.with_conn(reader::list_tables).await
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let table = table.to_string();
        self.with_conn(move |conn| reader::get_table_row_count(conn, &table))
            .await
    }

    async fn read_rows_after(
        &self,
        table: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<RowBatch> {
        let table = table.to_string();
        let cursor = *cursor;
        self.with_conn(move |conn| reader::read_rows_after(conn, &table, &cursor, limit))
            .await
    }
}
