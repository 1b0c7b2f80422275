// ABOUTME: Per-table progress tracking, aggregate percentages, and push events
// ABOUTME: One snapshot type feeds both status queries and progress listeners

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of one table within a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Pending => "pending",
            TableStatus::InProgress => "in_progress",
            TableStatus::Completed => "completed",
            TableStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TableStatus::Pending),
            "in_progress" => Ok(TableStatus::InProgress),
            "completed" => Ok(TableStatus::Completed),
            "failed" => Ok(TableStatus::Failed),
            other => bail!("Unknown table status '{}'", other),
        }
    }
}

/// Resume position inside a table
///
/// `Key` holds the last copied primary key for tables read in key order,
/// `Offset` the number of rows consumed for tables read in rowid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cursor {
    #[default]
    Start,
    Key(i64),
    Offset(u64),
}

impl Cursor {
    /// True when moving from `previous` to `self` never goes backwards
    pub fn follows(&self, previous: &Cursor) -> bool {
        match (previous, self) {
            (Cursor::Start, _) => true,
            (Cursor::Key(prev), Cursor::Key(next)) => next >= prev,
            (Cursor::Offset(prev), Cursor::Offset(next)) => next >= prev,
            _ => false,
        }
    }
}

/// Progress of a single table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProgress {
    pub table_name: String,
    pub total_rows: u64,
    pub transferred_rows: u64,
    pub cursor: Cursor,
    pub status: TableStatus,
    pub last_error: Option<String>,
}

impl TableProgress {
    pub fn new(table_name: impl Into<String>, total_rows: u64) -> Self {
        Self {
            table_name: table_name.into(),
            total_rows,
            transferred_rows: 0,
            cursor: Cursor::Start,
            status: TableStatus::Pending,
            last_error: None,
        }
    }

    /// Integer percentage for this table
    ///
    /// Empty tables report 100 once completed and 0 before.
    pub fn percent(&self) -> u32 {
        if self.total_rows == 0 {
            return if self.status == TableStatus::Completed {
                100
            } else {
                0
            };
        }
        floor_percent(self.transferred_rows, self.total_rows)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TableStatus::Completed
    }

    pub fn mark_in_progress(&mut self) {
        self.status = TableStatus::InProgress;
        self.last_error = None;
    }

    /// Account for one committed batch
    ///
    /// Rejects a cursor that would move backwards. If the source grew since
    /// planning, `total_rows` is raised so `transferred <= total` keeps holding.
    pub fn record_batch(&mut self, rows: u64, cursor: Cursor) -> Result<()> {
        if !cursor.follows(&self.cursor) {
            bail!(
                "Cursor for '{}' would move backwards ({:?} -> {:?})",
                self.table_name,
                self.cursor,
                cursor
            );
        }

        self.transferred_rows += rows;
        self.cursor = cursor;
        if self.transferred_rows > self.total_rows {
            self.total_rows = self.transferred_rows;
        }
        Ok(())
    }

    /// Finish the table; the total snaps to what was actually copied.
    pub fn mark_completed(&mut self) {
        self.total_rows = self.transferred_rows;
        self.status = TableStatus::Completed;
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = TableStatus::Failed;
        self.last_error = Some(reason.into());
    }
}

/// `floor(100 * part / whole)`, 0 for an empty whole
pub fn floor_percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as u128 * 100) / whole as u128).min(100) as u32
}

/// Aggregate over all tables, weighted by row count
///
/// Never reports 100 while any table is still outstanding.
pub fn overall_percent(tables: &[TableProgress]) -> u32 {
    let transferred: u64 = tables.iter().map(|t| t.transferred_rows).sum();
    let total: u64 = tables.iter().map(|t| t.total_rows).sum();

    let percent = floor_percent(transferred, total);
    if percent >= 100 && !tables.iter().all(TableProgress::is_completed) {
        99
    } else {
        percent
    }
}

/// State of the controller's job slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

/// User-facing summary of where a transfer stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallState {
    Idle,
    Running,
    Cancelling,
    Paused,
    Failed,
    Completed,
}

impl OverallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallState::Idle => "idle",
            OverallState::Running => "running",
            OverallState::Cancelling => "cancelling",
            OverallState::Paused => "paused",
            OverallState::Failed => "failed",
            OverallState::Completed => "completed",
        }
    }

    /// Active job states win; otherwise the table records decide.
    pub fn derive(job: JobState, tables: &[TableProgress]) -> Self {
        match job {
            JobState::Running => return OverallState::Running,
            JobState::Cancelling => return OverallState::Cancelling,
            _ => {}
        }

        if tables.iter().any(|t| t.status == TableStatus::Failed) {
            OverallState::Failed
        } else if !tables.is_empty() && tables.iter().all(TableProgress::is_completed) {
            OverallState::Completed
        } else if tables
            .iter()
            .any(|t| t.transferred_rows > 0 || t.status != TableStatus::Pending)
        {
            OverallState::Paused
        } else {
            OverallState::Idle
        }
    }
}

/// Point-in-time view of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSnapshot {
    pub running: bool,
    pub state: OverallState,
    pub overall_percent: u32,
    pub transferred_rows: u64,
    pub total_rows: u64,
    pub tables: Vec<TableProgress>,
}

impl TransferSnapshot {
    pub fn new(job: JobState, tables: Vec<TableProgress>) -> Self {
        Self {
            running: matches!(job, JobState::Running | JobState::Cancelling),
            state: OverallState::derive(job, &tables),
            overall_percent: overall_percent(&tables),
            transferred_rows: tables.iter().map(|t| t.transferred_rows).sum(),
            total_rows: tables.iter().map(|t| t.total_rows).sum(),
            tables,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableProgress> {
        self.tables.iter().find(|t| t.table_name == name)
    }
}

/// Event pushed to listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Progress {
        #[serde(skip_serializing_if = "Option::is_none")]
        table: Option<String>,
        percent: u32,
        transferred: u64,
        total: u64,
        overall_percent: u32,
        overall_transferred: u64,
        overall_total: u64,
    },
    Error {
        error: String,
    },
}

impl ProgressEvent {
    /// Progress of one table, framed by the snapshot's totals
    pub fn for_table(snapshot: &TransferSnapshot, table: &TableProgress) -> Self {
        ProgressEvent::Progress {
            table: Some(table.table_name.clone()),
            percent: table.percent(),
            transferred: table.transferred_rows,
            total: table.total_rows,
            overall_percent: snapshot.overall_percent,
            overall_transferred: snapshot.transferred_rows,
            overall_total: snapshot.total_rows,
        }
    }

    /// Whole-transfer event without a table, sent when the copy loop ends
    pub fn summary(snapshot: &TransferSnapshot) -> Self {
        ProgressEvent::Progress {
            table: None,
            percent: snapshot.overall_percent,
            transferred: snapshot.transferred_rows,
            total: snapshot.total_rows,
            overall_percent: snapshot.overall_percent,
            overall_transferred: snapshot.transferred_rows,
            overall_total: snapshot.total_rows,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            error: message.into(),
        }
    }
}

/// Receives progress events from the background copy task
///
/// Called on the copy task itself, so implementations should hand the event
/// off quickly.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Forwards events into a tokio channel; a closed channel is ignored.
pub struct ChannelListener(pub tokio::sync::mpsc::UnboundedSender<ProgressEvent>);

impl ProgressListener for ChannelListener {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self.0.send(event.clone());
    }
}

/// Adapts a closure into a listener
pub struct FnListener<F>(pub F);

impl<F> ProgressListener for FnListener<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, total: u64, transferred: u64, status: TableStatus) -> TableProgress {
        TableProgress {
            table_name: name.to_string(),
            total_rows: total,
            transferred_rows: transferred,
            cursor: Cursor::Start,
            status,
            last_error: None,
        }
    }

    #[test]
    fn test_overall_percent_is_weighted_by_rows() {
        // accounts done (3/3), messages at 20% (2000/10000)
        let tables = vec![
            table("accounts", 3, 3, TableStatus::Completed),
            table("messages", 10_000, 2_000, TableStatus::InProgress),
        ];
        // floor(100 * 2003 / 10003) = 20, not the per-table mean of 60
        assert_eq!(overall_percent(&tables), 20);
    }

    #[test]
    fn test_overall_percent_zero_total() {
        assert_eq!(overall_percent(&[]), 0);
        let tables = vec![table("accounts", 0, 0, TableStatus::Completed)];
        assert_eq!(overall_percent(&tables), 0);
    }

    #[test]
    fn test_overall_percent_capped_until_all_completed() {
        let tables = vec![
            table("accounts", 5, 5, TableStatus::Completed),
            table("chats", 5, 5, TableStatus::InProgress),
        ];
        assert_eq!(overall_percent(&tables), 99);

        let done = vec![
            table("accounts", 5, 5, TableStatus::Completed),
            table("chats", 5, 5, TableStatus::Completed),
        ];
        assert_eq!(overall_percent(&done), 100);
    }

    #[test]
    fn test_overall_percent_floors() {
        let tables = vec![table("messages", 3, 2, TableStatus::InProgress)];
        assert_eq!(overall_percent(&tables), 66);
    }

    #[test]
    fn test_table_percent_for_empty_table() {
        let mut t = table("blacklist_entries", 0, 0, TableStatus::Pending);
        assert_eq!(t.percent(), 0);
        t.mark_completed();
        assert_eq!(t.percent(), 100);
    }

    #[test]
    fn test_record_batch_rejects_backwards_cursor() {
        let mut t = TableProgress::new("messages", 10);
        t.record_batch(5, Cursor::Key(50)).unwrap();
        assert!(t.record_batch(5, Cursor::Key(40)).is_err());
        assert!(t.record_batch(5, Cursor::Offset(60)).is_err());
        assert_eq!(t.transferred_rows, 5);
        assert_eq!(t.cursor, Cursor::Key(50));
    }

    #[test]
    fn test_record_batch_grows_total_when_source_grew() {
        let mut t = TableProgress::new("messages", 3);
        t.record_batch(4, Cursor::Offset(4)).unwrap();
        assert_eq!(t.total_rows, 4);
        assert_eq!(t.transferred_rows, 4);
    }

    #[test]
    fn test_mark_completed_snaps_total() {
        let mut t = TableProgress::new("messages", 10);
        t.record_batch(8, Cursor::Key(8)).unwrap();
        t.mark_completed();
        assert_eq!(t.total_rows, 8);
        assert_eq!(t.percent(), 100);
    }

    #[test]
    fn test_mark_in_progress_clears_error() {
        let mut t = TableProgress::new("messages", 10);
        t.mark_failed("boom");
        assert_eq!(t.last_error.as_deref(), Some("boom"));
        t.mark_in_progress();
        assert_eq!(t.status, TableStatus::InProgress);
        assert!(t.last_error.is_none());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TableStatus::Pending,
            TableStatus::InProgress,
            TableStatus::Completed,
            TableStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TableStatus>().unwrap(), status);
        }
        assert!("paused".parse::<TableStatus>().is_err());
    }

    #[test]
    fn test_overall_state_derivation() {
        let pending = vec![table("a", 3, 0, TableStatus::Pending)];
        assert_eq!(
            OverallState::derive(JobState::Idle, &pending),
            OverallState::Idle
        );
        assert_eq!(
            OverallState::derive(JobState::Running, &pending),
            OverallState::Running
        );

        let paused = vec![
            table("a", 3, 3, TableStatus::Completed),
            table("b", 10, 4, TableStatus::InProgress),
        ];
        assert_eq!(
            OverallState::derive(JobState::Cancelled, &paused),
            OverallState::Paused
        );

        let mut failed = paused.clone();
        failed[1].mark_failed("write error");
        assert_eq!(
            OverallState::derive(JobState::Failed, &failed),
            OverallState::Failed
        );

        let done = vec![table("a", 3, 3, TableStatus::Completed)];
        assert_eq!(
            OverallState::derive(JobState::Idle, &done),
            OverallState::Completed
        );
    }

    #[test]
    fn test_progress_event_json_shape() {
        let snapshot = TransferSnapshot::new(
            JobState::Running,
            vec![
                table("accounts", 3, 3, TableStatus::Completed),
                table("messages", 10, 5, TableStatus::InProgress),
            ],
        );
        let event = ProgressEvent::for_table(&snapshot, &snapshot.tables[1]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["table"], "messages");
        assert_eq!(json["percent"], 50);
        assert_eq!(json["transferred"], 5);
        assert_eq!(json["total"], 10);
        assert_eq!(json["overall_percent"], 61);
        assert_eq!(json["overall_transferred"], 8);
        assert_eq!(json["overall_total"], 13);

        let summary = serde_json::to_value(ProgressEvent::summary(&snapshot)).unwrap();
        assert!(summary.get("table").is_none());

        let error = serde_json::to_value(ProgressEvent::error("lost connection")).unwrap();
        assert_eq!(error, serde_json::json!({"error": "lost connection"}));
    }

    #[test]
    fn test_cursor_serialization() {
        let json = serde_json::to_value(Cursor::Key(42)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "key", "value": 42}));
        let start: Cursor = serde_json::from_value(serde_json::json!({"kind": "start"})).unwrap();
        assert_eq!(start, Cursor::Start);
    }

    #[test]
    fn test_channel_listener_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let listener = ChannelListener(tx);
        listener.on_progress(&ProgressEvent::error("x"));
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::error("x"));
    }
}
