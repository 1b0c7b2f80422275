// ABOUTME: Checkpoint store backed by the transfer_progress table of the local database
// ABOUTME: Upgrades tables written by older releases that lack cursor and error columns

use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::progress::{Cursor, TableStatus};
use crate::utils::hash_string;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const PROGRESS_TABLE: &str = "transfer_progress";

/// Columns added after the first release of the progress table
const UPGRADE_COLUMNS: &[(&str, &str)] = &[("cursor_kind", "TEXT"), ("last_error", "TEXT")];

pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// Open (read-write) the database holding the progress table
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).with_context(|| {
            format!("Failed to open checkpoint database {}", path.display())
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout on checkpoint database")?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        ensure_progress_table(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn ensure_progress_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY,
            table_name VARCHAR(100) NOT NULL UNIQUE,
            total_rows INTEGER DEFAULT 0,
            transferred_rows INTEGER DEFAULT 0,
            last_transferred_id INTEGER DEFAULT 0,
            status VARCHAR(20) DEFAULT 'pending',
            target_url VARCHAR(500),
            started_at DATETIME,
            updated_at DATETIME,
            cursor_kind TEXT,
            last_error TEXT
        )",
        PROGRESS_TABLE
    ))
    .context("Failed to create transfer_progress table")?;

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", PROGRESS_TABLE))
        .context("Failed to inspect transfer_progress table")?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .context("Failed to inspect transfer_progress columns")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to collect transfer_progress columns")?;

    for (column, sql_type) in UPGRADE_COLUMNS {
        if !existing.iter().any(|c| c == column) {
            tracing::info!("Adding column '{}' to {}", column, PROGRESS_TABLE);
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    PROGRESS_TABLE, column, sql_type
                ),
                [],
            )
            .with_context(|| format!("Failed to add column '{}' to transfer_progress", column))?;
        }
    }

    Ok(())
}

fn encode_cursor(cursor: &Cursor) -> (&'static str, i64) {
    match cursor {
        Cursor::Start => ("start", 0),
        Cursor::Key(key) => ("key", *key),
        Cursor::Offset(offset) => ("offset", *offset as i64),
    }
}

fn decode_cursor(kind: Option<&str>, value: i64) -> Result<Cursor> {
    match kind {
        Some("start") => Ok(Cursor::Start),
        Some("key") => Ok(Cursor::Key(value)),
        Some("offset") => Ok(Cursor::Offset(value.max(0) as u64)),
        // Rows from older releases only ever tracked the last id
        None if value > 0 => Ok(Cursor::Key(value)),
        None => Ok(Cursor::Start),
        Some(other) => bail!("Unknown cursor kind '{}' in transfer_progress", other),
    }
}

/// Destination hash for a stored `target_url`
///
/// Older releases stored the raw URL (or nothing). Raw URLs are hashed in
/// their normalized form so they match the destination they were made against;
/// a missing URL stays unbound.
fn bind_destination(target_url: Option<String>) -> String {
    let Some(raw) = target_url.map(|t| t.trim().to_string()) else {
        return String::new();
    };
    if raw.is_empty() || is_destination_hash(&raw) {
        return raw;
    }
    let normalized = crate::mysql::normalize_mysql_url(&raw).unwrap_or(raw);
    hash_string(&normalized)
}

fn is_destination_hash(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn parse_timestamp(text: Option<String>) -> DateTime<Utc> {
    text.and_then(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&t, "%Y-%m-%d %H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
                    .ok()
            })
    })
    .unwrap_or_else(Utc::now)
}

impl CheckpointStore for SqliteCheckpointStore {
    fn load(&self) -> Result<Vec<CheckpointRecord>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn
            .prepare(&format!(
                "SELECT table_name, total_rows, transferred_rows, last_transferred_id, \
                 cursor_kind, status, last_error, target_url, updated_at \
                 FROM {} ORDER BY id",
                PROGRESS_TABLE
            ))
            .context("Failed to prepare checkpoint query")?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            })
            .context("Failed to query transfer_progress")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read transfer_progress rows")?;

        raw.into_iter()
            .map(
                |(table_name, total, transferred, last_id, kind, status, error, dest, updated)| {
                    let status: TableStatus = status
                        .as_deref()
                        .unwrap_or("pending")
                        .parse()
                        .with_context(|| format!("Bad status for table '{}'", table_name))?;
                    Ok(CheckpointRecord {
                        cursor: decode_cursor(kind.as_deref(), last_id)?,
                        table_name,
                        total_rows: total.max(0) as u64,
                        transferred_rows: transferred.max(0) as u64,
                        status,
                        last_error: error,
                        destination: bind_destination(dest),
                        updated_at: parse_timestamp(updated),
                    })
                },
            )
            .collect()
    }

    fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let (cursor_kind, cursor_value) = encode_cursor(&record.cursor);
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            &format!(
                "INSERT INTO {} (table_name, total_rows, transferred_rows, last_transferred_id, \
                 cursor_kind, status, last_error, target_url, started_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
                 ON CONFLICT(table_name) DO UPDATE SET \
                 total_rows = excluded.total_rows, \
                 transferred_rows = excluded.transferred_rows, \
                 last_transferred_id = excluded.last_transferred_id, \
                 cursor_kind = excluded.cursor_kind, \
                 status = excluded.status, \
                 last_error = excluded.last_error, \
                 target_url = excluded.target_url, \
                 updated_at = excluded.updated_at",
                PROGRESS_TABLE
            ),
            params![
                record.table_name,
                record.total_rows as i64,
                record.transferred_rows as i64,
                cursor_value,
                cursor_kind,
                record.status.as_str(),
                record.last_error,
                record.destination,
                record.updated_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to save checkpoint for '{}'", record.table_name))?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(&format!("DELETE FROM {}", PROGRESS_TABLE), [])
            .context("Failed to clear transfer_progress")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, cursor: Cursor, status: TableStatus) -> CheckpointRecord {
        CheckpointRecord {
            table_name: name.to_string(),
            total_rows: 10_000,
            transferred_rows: 4_000,
            cursor,
            status,
            last_error: None,
            destination: hash_string("mysql://db/app"),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load_preserve_cursor_kinds() {
        let store = SqliteCheckpointStore::from_connection(Connection::open_in_memory().unwrap())
            .unwrap();

        store
            .save(&record("telegram_messages", Cursor::Key(4_123), TableStatus::InProgress))
            .unwrap();
        store
            .save(&record("audit_log", Cursor::Offset(4_000), TableStatus::InProgress))
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].cursor, Cursor::Key(4_123));
        assert_eq!(loaded[1].cursor, Cursor::Offset(4_000));
        assert_eq!(loaded[0].destination, hash_string("mysql://db/app"));
    }

    #[test]
    fn test_save_updates_existing_row() {
        let store = SqliteCheckpointStore::from_connection(Connection::open_in_memory().unwrap())
            .unwrap();

        store
            .save(&record("telegram_messages", Cursor::Key(10), TableStatus::InProgress))
            .unwrap();
        let mut failed = record("telegram_messages", Cursor::Key(20), TableStatus::Failed);
        failed.last_error = Some("Lost connection".to_string());
        store.save(&failed).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, TableStatus::Failed);
        assert_eq!(loaded[0].cursor, Cursor::Key(20));
        assert_eq!(loaded[0].last_error.as_deref(), Some("Lost connection"));
    }

    #[test]
    fn test_upgrades_legacy_progress_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE transfer_progress (
                id INTEGER PRIMARY KEY,
                table_name VARCHAR(100) NOT NULL UNIQUE,
                total_rows INTEGER DEFAULT 0,
                transferred_rows INTEGER DEFAULT 0,
                last_transferred_id INTEGER DEFAULT 0,
                status VARCHAR(20) DEFAULT 'pending',
                target_url VARCHAR(500),
                started_at DATETIME,
                updated_at DATETIME
            );
            INSERT INTO transfer_progress (table_name, total_rows, transferred_rows, last_transferred_id, status, updated_at)
            VALUES ('telegram_chats', 500, 200, 217, 'in_progress', '2024-05-01 09:30:00.123456');
            INSERT INTO transfer_progress (table_name, total_rows, transferred_rows, last_transferred_id, status)
            VALUES ('telegram_messages', 900, 0, 0, 'pending');",
        )
        .unwrap();

        let store = SqliteCheckpointStore::from_connection(conn).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded[0].table_name, "telegram_chats");
        assert_eq!(loaded[0].cursor, Cursor::Key(217));
        assert_eq!(loaded[0].status, TableStatus::InProgress);
        assert_eq!(
            loaded[0].updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-05-01 09:30:00"
        );
        assert_eq!(loaded[1].cursor, Cursor::Start);
    }

    #[test]
    fn test_legacy_target_urls_bind_to_normalized_hash() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE transfer_progress (
                id INTEGER PRIMARY KEY,
                table_name VARCHAR(100) NOT NULL UNIQUE,
                total_rows INTEGER DEFAULT 0,
                transferred_rows INTEGER DEFAULT 0,
                last_transferred_id INTEGER DEFAULT 0,
                status VARCHAR(20) DEFAULT 'pending',
                target_url VARCHAR(500),
                started_at DATETIME,
                updated_at DATETIME
            );
            INSERT INTO transfer_progress (table_name, status, target_url)
            VALUES ('telegram_accounts', 'completed',
                    'mysql+pymysql://app:pw@db:3306/app?ssl-mode=REQUIRED');
            INSERT INTO transfer_progress (table_name, status, target_url)
            VALUES ('telegram_chats', 'pending', NULL);",
        )
        .unwrap();

        let store = SqliteCheckpointStore::from_connection(conn).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded[0].destination, hash_string("mysql://app:pw@db:3306/app"));
        assert_eq!(loaded[1].destination, "");

        // Hashes written by this release load unchanged
        store.save(&loaded[0]).unwrap();
        assert_eq!(store.load().unwrap()[0].destination, loaded[0].destination);
    }

    #[test]
    fn test_reset_clears_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteCheckpointStore::from_connection(conn).unwrap();
        store
            .save(&record("telegram_messages", Cursor::Key(1), TableStatus::InProgress))
            .unwrap();
        store.reset().unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
