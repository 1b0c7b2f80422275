// ABOUTME: SQLite database introspection and ordered batch reads
// ABOUTME: Functions to list tables, count rows, and read rows after a resume cursor

use super::converter::sqlite_value_to_value;
use crate::progress::Cursor;
use crate::store::{Column, ColumnKind, RowBatch, Value};
use crate::utils::validate_table_name;
use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Column layout of a table plus the key used for ordered reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    /// Integer primary key column, when the table has one
    pub key_column: Option<String>,
}

/// List all user tables in a SQLite database
///
/// Queries sqlite_master for user-created tables, excluding the `sqlite_*`
/// system tables. Sorted by name.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    tracing::debug!("Listing tables from SQLite database");

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type='table' \
             AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .context("Failed to prepare statement to list tables")?;

    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("Failed to query table list")?
        .collect::<Result<Vec<String>, _>>()
        .context("Failed to collect table names")?;

    tracing::debug!("Found {} user tables in SQLite database", tables.len());

    Ok(tables)
}

/// Get row count for a specific table
///
/// # Security
///
/// The table name is validated before being embedded in SQL.
pub fn get_table_row_count(conn: &Connection, table: &str) -> Result<u64> {
    validate_table_name(table).context("Invalid table name for row count query")?;

    tracing::debug!("Getting row count for table '{}'", table);

    let query = format!("SELECT COUNT(*) FROM \"{}\"", table);

    let count: i64 = conn
        .query_row(&query, [], |row| row.get(0))
        .with_context(|| format!("Failed to count rows in table '{}'", table))?;

    Ok(count.max(0) as u64)
}

/// Read the column layout of a table
///
/// The key column is the table's single INTEGER primary key. Tables without
/// one fall back to an integer column named `id`, and failing that to no key,
/// which makes reads use rowid order with offsets.
pub fn table_schema(conn: &Connection, table: &str) -> Result<TableSchema> {
    validate_table_name(table).context("Invalid table name for schema query")?;

    let query = format!("PRAGMA table_info(\"{}\")", table);
    let mut stmt = conn
        .prepare(&query)
        .with_context(|| format!("Failed to get table info for '{}'", table))?;

    // (name, declared type, primary key position)
    let info: Vec<(String, String, i64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                row.get::<_, i64>(5)?,
            ))
        })
        .with_context(|| format!("Failed to query columns of '{}'", table))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to collect columns of '{}'", table))?;

    if info.is_empty() {
        bail!("Table '{}' does not exist or has no columns", table);
    }

    let columns: Vec<Column> = info
        .iter()
        .map(|(name, declared, _)| Column::new(name.clone(), ColumnKind::from_declared_type(declared)))
        .collect();

    let pk_columns: Vec<&Column> = info
        .iter()
        .zip(&columns)
        .filter(|((_, _, pk), _)| *pk > 0)
        .map(|(_, column)| column)
        .collect();

    let key_column = match pk_columns.as_slice() {
        [only] if only.kind == ColumnKind::Integer => Some(only.name.clone()),
        _ => columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case("id") && c.kind == ColumnKind::Integer)
            .map(|c| c.name.clone()),
    };

    tracing::debug!(
        "Table '{}' has {} columns, key column: {:?}",
        table,
        columns.len(),
        key_column
    );

    Ok(TableSchema {
        columns,
        key_column,
    })
}

/// Read up to `limit` rows that come strictly after `cursor`
///
/// Keyed tables are read `ORDER BY key` starting after the last copied key;
/// the returned cursor is the key of the last row. Unkeyed tables are read in
/// rowid order and the cursor counts rows consumed. Either way, re-reading from
/// a persisted cursor never skips or repeats a committed range.
pub fn read_rows_after(
    conn: &Connection,
    table: &str,
    cursor: &Cursor,
    limit: usize,
) -> Result<RowBatch> {
    let schema = table_schema(conn, table)?;
    let column_list = schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let limit = i64::try_from(limit).context("Batch size too large")?;

    let rows = match (&schema.key_column, cursor) {
        (Some(key), Cursor::Start) => {
            let sql = format!(
                "SELECT {} FROM \"{}\" ORDER BY {} LIMIT ?1",
                column_list,
                table,
                quote_ident(key)
            );
            query_rows(conn, table, &sql, rusqlite::params![limit], schema.columns.len())?
        }
        (Some(key), Cursor::Key(last)) => {
            let sql = format!(
                "SELECT {} FROM \"{}\" WHERE {} > ?1 ORDER BY {} LIMIT ?2",
                column_list,
                table,
                quote_ident(key),
                quote_ident(key)
            );
            query_rows(
                conn,
                table,
                &sql,
                rusqlite::params![last, limit],
                schema.columns.len(),
            )?
        }
        (None, Cursor::Start) | (None, Cursor::Offset(_)) => {
            let offset = match cursor {
                Cursor::Offset(n) => i64::try_from(*n).context("Offset cursor too large")?,
                _ => 0,
            };
            let sql = format!(
                "SELECT {} FROM \"{}\" ORDER BY rowid LIMIT ?1 OFFSET ?2",
                column_list, table
            );
            query_rows(
                conn,
                table,
                &sql,
                rusqlite::params![limit, offset],
                schema.columns.len(),
            )?
        }
        (Some(_), Cursor::Offset(_)) | (None, Cursor::Key(_)) => {
            bail!(
                "Cursor {:?} does not match the layout of table '{}'; the source schema changed since the checkpoint was written",
                cursor,
                table
            );
        }
    };

    let next = match &schema.key_column {
        Some(key) => match rows.last() {
            None => *cursor,
            Some(last_row) => {
                let idx = schema
                    .columns
                    .iter()
                    .position(|c| &c.name == key)
                    .context("Key column missing from result set")?;
                match &last_row[idx] {
                    Value::Integer(k) => Cursor::Key(*k),
                    other => bail!(
                        "Key column '{}' of table '{}' holds a non-integer value {:?}",
                        key,
                        table,
                        other
                    ),
                }
            }
        },
        None => {
            let consumed = match cursor {
                Cursor::Offset(n) => *n,
                _ => 0,
            };
            Cursor::Offset(consumed + rows.len() as u64)
        }
    };

    tracing::debug!(
        "Read {} rows from '{}' after {:?}, next cursor {:?}",
        rows.len(),
        table,
        cursor,
        next
    );

    Ok(RowBatch {
        columns: schema.columns,
        rows,
        next,
    })
}

fn query_rows<P: rusqlite::Params>(
    conn: &Connection,
    table: &str,
    sql: &str,
    params: P,
    width: usize,
) -> Result<Vec<Vec<Value>>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("Failed to prepare statement for table '{}'", table))?;

    let rows = stmt
        .query_map(params, |row| {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                let value: rusqlite::types::Value = row.get(idx)?;
                values.push(sqlite_value_to_value(value));
            }
            Ok(values)
        })
        .with_context(|| format!("Failed to query rows from table '{}'", table))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to collect rows from table '{}'", table))?;

    Ok(rows)
}

/// Quote a column name for SQLite, doubling embedded quotes
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
