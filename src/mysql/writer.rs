// ABOUTME: Batched, idempotent writes into MySQL destination tables
// ABOUTME: Builds multi-row upserts that stay under the server's placeholder limit

use super::converter::rows_to_params;
use crate::store::{Column, Value};
use crate::utils::validate_table_name;
use anyhow::{bail, Context, Result};
use mysql_async::prelude::*;
use mysql_async::{Conn, Params, TxOpts};

/// Prepared statements may carry at most this many `?` placeholders
pub const MAX_PLACEHOLDERS: usize = 65_535;

/// Quote a MySQL identifier with backticks, doubling embedded backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// How many rows fit in one statement for a table of `column_count` columns
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_PLACEHOLDERS / column_count.max(1)).max(1)
}

/// Build `INSERT ... ON DUPLICATE KEY UPDATE` for `row_count` rows
///
/// Re-running the statement with the same rows leaves the table unchanged,
/// which is what makes replaying a batch after a crash safe.
///
/// # Examples
///
/// ```
/// # use db_transfer::mysql::writer::build_upsert_sql;
/// # use db_transfer::store::{Column, ColumnKind};
/// let columns = vec![
///     Column::new("id", ColumnKind::Integer),
///     Column::new("name", ColumnKind::Text),
/// ];
/// let sql = build_upsert_sql("ai_configs", &columns, 2).unwrap();
/// assert_eq!(
///     sql,
///     "INSERT INTO `ai_configs` (`id`, `name`) VALUES (?, ?), (?, ?) \
///      ON DUPLICATE KEY UPDATE `id` = VALUES(`id`), `name` = VALUES(`name`)"
/// );
/// ```
pub fn build_upsert_sql(table: &str, columns: &[Column], row_count: usize) -> Result<String> {
    validate_table_name(table).context("Invalid destination table name")?;
    if columns.is_empty() {
        bail!("Cannot write to '{}' without columns", table);
    }
    if row_count == 0 {
        bail!("Cannot build an insert for '{}' with no rows", table);
    }
    if row_count * columns.len() > MAX_PLACEHOLDERS {
        bail!(
            "Insert into '{}' would use {} placeholders (limit {})",
            table,
            row_count * columns.len(),
            MAX_PLACEHOLDERS
        );
    }

    let column_list = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let row_placeholder = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![row_placeholder.as_str(); row_count].join(", ");
    let updates = columns
        .iter()
        .map(|c| {
            let quoted = quote_ident(&c.name);
            format!("{} = VALUES({})", quoted, quoted)
        })
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {} ON DUPLICATE KEY UPDATE {}",
        quote_ident(table),
        column_list,
        values,
        updates
    ))
}

/// Upsert a batch inside one transaction
///
/// Large batches are split into several statements, but all of them commit
/// together. On any error the transaction is dropped and rolled back.
pub async fn upsert_rows(
    conn: &mut Conn,
    table: &str,
    columns: &[Column],
    rows: Vec<Vec<Value>>,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    if let Some(bad) = rows.iter().find(|row| row.len() != columns.len()) {
        bail!(
            "Row for '{}' has {} values but {} columns were read",
            table,
            bad.len(),
            columns.len()
        );
    }

    let per_statement = rows_per_statement(columns.len());
    let total = rows.len();

    let mut tx = conn
        .start_transaction(TxOpts::default())
        .await
        .with_context(|| format!("Failed to begin transaction for '{}'", table))?;

    let mut remaining = rows.into_iter();
    loop {
        let chunk: Vec<Vec<Value>> = remaining.by_ref().take(per_statement).collect();
        if chunk.is_empty() {
            break;
        }

        let sql = build_upsert_sql(table, columns, chunk.len())?;
        tx.exec_drop(sql, Params::Positional(rows_to_params(chunk)))
            .await
            .with_context(|| format!("Failed to upsert rows into '{}'", table))?;
    }

    tx.commit()
        .await
        .with_context(|| format!("Failed to commit batch for '{}'", table))?;

    tracing::debug!("Upserted {} rows into '{}'", total, table);
    Ok(())
}

/// Tables in the connection's current database
pub async fn list_tables(conn: &mut Conn) -> Result<Vec<String>> {
    let tables: Vec<String> = conn
        .query("SHOW TABLES")
        .await
        .context("Failed to list MySQL tables")?;
    Ok(tables)
}
