// ABOUTME: Builds the ordered table plan and merges it with saved checkpoints
// ABOUTME: Table order follows foreign-key dependencies of the destination schema

use crate::checkpoint::CheckpointRecord;
use crate::error::{TransferError, TransferResult};
use crate::progress::{TableProgress, TableStatus};
use crate::store::SourceStore;

/// Tables copied by a transfer, parents before the tables referencing them
pub const TRANSFER_TABLES: &[&str] = &[
    "telegram_accounts",
    "telegram_sessions_db",
    "telegram_chats",
    "telegram_messages",
    "telegram_media_folders",
    "telegram_media_files",
    "telegram_media_folder_accounts",
    "telegram_profiles",
    "telegram_profile_accounts",
    "ai_configs",
    "ai_auto_reply_accounts",
    "blacklist_entries",
];

/// Resolve a configured table list into dependency order
///
/// `None` (or an empty list) selects every transfer table. Duplicates are
/// collapsed; names outside `TRANSFER_TABLES` are rejected.
pub fn select_tables(requested: Option<&[String]>) -> TransferResult<Vec<String>> {
    let requested = match requested {
        Some(list) if !list.is_empty() => list,
        _ => return Ok(TRANSFER_TABLES.iter().map(|t| t.to_string()).collect()),
    };

    let unknown: Vec<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|name| !TRANSFER_TABLES.contains(name))
        .collect();
    if !unknown.is_empty() {
        return Err(TransferError::InvalidConfig(format!(
            "Unknown tables: {}",
            unknown.join(", ")
        )));
    }

    Ok(TRANSFER_TABLES
        .iter()
        .filter(|t| requested.iter().any(|r| r == *t))
        .map(|t| t.to_string())
        .collect())
}

/// Count rows for every selected table present in the source
///
/// Read-only. Any source error aborts the whole plan with `SourceUnavailable`.
/// Empty tables come back already completed.
pub async fn build_plan(
    source: &dyn SourceStore,
    tables: &[String],
) -> TransferResult<Vec<TableProgress>> {
    let present = source
        .list_tables()
        .await
        .map_err(TransferError::source_unavailable)?;

    let mut plan = Vec::new();
    for table in tables {
        if !present.contains(table) {
            tracing::debug!("Table '{}' not in source, skipping", table);
            continue;
        }

        let total = source
            .count_rows(table)
            .await
            .map_err(TransferError::source_unavailable)?;

        let mut progress = TableProgress::new(table.clone(), total);
        if total == 0 {
            progress.mark_completed();
        }
        plan.push(progress);
    }

    tracing::info!(
        "Planned {} tables ({} rows)",
        plan.len(),
        plan.iter().map(|t| t.total_rows).sum::<u64>()
    );
    Ok(plan)
}

/// Overlay saved checkpoints on a fresh plan
///
/// Records for tables outside the plan are ignored.
pub fn merge_checkpoints(
    plan: Vec<TableProgress>,
    records: &[CheckpointRecord],
) -> Vec<TableProgress> {
    plan.into_iter()
        .map(|fresh| {
            let Some(record) = records.iter().find(|r| r.table_name == fresh.table_name) else {
                return fresh;
            };

            if record.status == TableStatus::Completed {
                return record.to_progress();
            }

            let mut merged = TableProgress {
                total_rows: fresh.total_rows.max(record.transferred_rows),
                transferred_rows: record.transferred_rows,
                cursor: record.cursor,
                status: record.status,
                last_error: None,
                ..fresh
            };
            if merged.status == TableStatus::Failed {
                tracing::info!(
                    "Retrying failed table '{}' from row {}",
                    merged.table_name,
                    merged.transferred_rows
                );
                merged.status = TableStatus::Pending;
            }
            if merged.total_rows == 0 {
                merged.mark_completed();
            }
            merged
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Cursor;
    use crate::store::RowBatch;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::Utc;

    struct FixedSource {
        tables: Vec<(&'static str, u64)>,
        broken: bool,
    }

    #[async_trait]
    impl SourceStore for FixedSource {
        async fn list_tables(&self) -> Result<Vec<String>> {
            if self.broken {
                bail!("unable to open database file");
            }
            Ok(self.tables.iter().map(|(t, _)| t.to_string()).collect())
        }

        async fn count_rows(&self, table: &str) -> Result<u64> {
            Ok(self
                .tables
                .iter()
                .find(|(t, _)| *t == table)
                .map(|(_, n)| *n)
                .unwrap_or(0))
        }

        async fn read_rows_after(&self, _: &str, cursor: &Cursor, _: usize) -> Result<RowBatch> {
            Ok(RowBatch {
                columns: Vec::new(),
                rows: Vec::new(),
                next: *cursor,
            })
        }
    }

    fn record(name: &str, transferred: u64, status: TableStatus) -> CheckpointRecord {
        CheckpointRecord {
            table_name: name.to_string(),
            total_rows: 1_000,
            transferred_rows: transferred,
            cursor: Cursor::Key(transferred as i64),
            status,
            last_error: Some("boom".to_string()).filter(|_| status == TableStatus::Failed),
            destination: "hash".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_select_all_by_default() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(select_tables(None).unwrap().len(), TRANSFER_TABLES.len());
        assert_eq!(
            select_tables(Some(empty.as_slice())).unwrap().len(),
            TRANSFER_TABLES.len()
        );
    }

    #[test]
    fn test_select_resorts_into_dependency_order() {
        let requested = vec![
            "telegram_messages".to_string(),
            "telegram_accounts".to_string(),
            "telegram_chats".to_string(),
            "telegram_accounts".to_string(),
        ];
        assert_eq!(
            select_tables(Some(requested.as_slice())).unwrap(),
            vec!["telegram_accounts", "telegram_chats", "telegram_messages"]
        );
    }

    #[test]
    fn test_select_rejects_unknown_tables() {
        let requested = vec!["telegram_accounts".to_string(), "transfer_progress".to_string()];
        let err = select_tables(Some(requested.as_slice())).unwrap_err();
        assert_eq!(
            err,
            TransferError::InvalidConfig("Unknown tables: transfer_progress".to_string())
        );
    }

    #[tokio::test]
    async fn test_build_plan_skips_missing_and_completes_empty() {
        let source = FixedSource {
            tables: vec![
                ("telegram_messages", 10_000),
                ("telegram_accounts", 3),
                ("blacklist_entries", 0),
                ("transfer_progress", 12),
            ],
            broken: false,
        };
        let plan = build_plan(&source, &select_tables(None).unwrap())
            .await
            .unwrap();

        let names: Vec<&str> = plan.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["telegram_accounts", "telegram_messages", "blacklist_entries"]
        );
        assert_eq!(plan[1].total_rows, 10_000);
        assert_eq!(plan[1].status, TableStatus::Pending);
        assert_eq!(plan[2].status, TableStatus::Completed);
        assert_eq!(plan[2].percent(), 100);
    }

    #[tokio::test]
    async fn test_build_plan_source_unavailable() {
        let source = FixedSource {
            tables: Vec::new(),
            broken: true,
        };
        let err = build_plan(&source, &select_tables(None).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::SourceUnavailable(msg) if msg.contains("unable to open")));
    }

    #[test]
    fn test_merge_keeps_completed_and_resumes_in_progress() {
        let plan = vec![
            TableProgress::new("telegram_accounts", 5),
            TableProgress::new("telegram_messages", 10_000),
            TableProgress::new("ai_configs", 1),
        ];
        let records = vec![
            record("telegram_accounts", 3, TableStatus::Completed),
            record("telegram_messages", 4_000, TableStatus::InProgress),
        ];

        let merged = merge_checkpoints(plan, &records);

        assert_eq!(merged[0].status, TableStatus::Completed);
        assert_eq!(merged[0].transferred_rows, 3);
        assert_eq!(merged[1].status, TableStatus::InProgress);
        assert_eq!(merged[1].total_rows, 10_000);
        assert_eq!(merged[1].cursor, Cursor::Key(4_000));
        assert_eq!(merged[1].percent(), 40);
        assert_eq!(merged[2], TableProgress::new("ai_configs", 1));
    }

    #[test]
    fn test_merge_failed_table_becomes_pending_with_cursor() {
        let plan = vec![TableProgress::new("telegram_messages", 10_000)];
        let records = vec![record("telegram_messages", 4_000, TableStatus::Failed)];

        let merged = merge_checkpoints(plan, &records);

        assert_eq!(merged[0].status, TableStatus::Pending);
        assert_eq!(merged[0].last_error, None);
        assert_eq!(merged[0].cursor, Cursor::Key(4_000));
        assert_eq!(merged[0].transferred_rows, 4_000);
    }

    #[test]
    fn test_merge_total_never_below_transferred() {
        // Rows were deleted from the source after they had been copied
        let plan = vec![TableProgress::new("telegram_messages", 2_500)];
        let records = vec![record("telegram_messages", 4_000, TableStatus::InProgress)];

        let merged = merge_checkpoints(plan, &records);

        assert_eq!(merged[0].total_rows, 4_000);
        assert_eq!(merged[0].transferred_rows, 4_000);
    }
}
