// ABOUTME: Read/write interfaces between the transfer engine and its data stores
// ABOUTME: Defines the row model shared by the SQLite source and MySQL destination

use crate::progress::Cursor;
use anyhow::Result;
use async_trait::async_trait;

/// A single column value, mirroring SQLite's storage classes
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Declared-type affinity of a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    DateTime,
    Numeric,
}

impl ColumnKind {
    /// Map a declared SQL type to a kind
    ///
    /// Follows SQLite's affinity rules, with BOOLEAN and DATE/TIME types split
    /// out since those are stored as integers and text respectively.
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();

        if upper.contains("BOOL") {
            ColumnKind::Boolean
        } else if upper.contains("DATE") || upper.contains("TIME") {
            ColumnKind::DateTime
        } else if upper.contains("INT") {
            ColumnKind::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnKind::Text
        } else if upper.contains("BLOB") || upper.is_empty() {
            ColumnKind::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnKind::Real
        } else {
            ColumnKind::Numeric
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One ordered batch read from the source
///
/// `next` is the cursor to persist once this batch is committed at the
/// destination. An empty batch means the table is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    pub next: Cursor,
}

impl RowBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read-only access to the database being copied
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Rows strictly after `cursor`, in a stable order, at most `limit` of them
    async fn read_rows_after(&self, table: &str, cursor: &Cursor, limit: usize)
        -> Result<RowBatch>;
}

/// A live connection to the destination database
#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Create any of `tables` that the destination is missing
    async fn ensure_schema(&self, tables: &[String]) -> Result<()>;

    /// Insert-or-replace keyed by primary key; all rows commit together or not at all
    async fn upsert_rows(&self, table: &str, columns: &[Column], rows: Vec<Vec<Value>>)
        -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens destination connections from a URL
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    /// Canonical form of `url`; spellings of the same destination normalize equal
    fn normalize(&self, url: &str) -> Result<String> {
        Ok(url.trim().to_string())
    }

    async fn connect(&self, url: &str) -> Result<Box<dyn DestinationStore>>;
}
