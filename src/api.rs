// ABOUTME: Caller-facing transfer operations with JSON-shaped responses
// ABOUTME: Thin wrappers over TransferController used by the bridge and the CLI

use crate::progress::{OverallState, TableProgress, TableStatus, TransferSnapshot};
use crate::transfer::TransferController;
use serde::{Deserialize, Serialize};

/// `{success: true}` or `{error: "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Success { success: bool },
    Error { error: String },
}

impl ActionResponse {
    pub fn ok() -> Self {
        ActionResponse::Success { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ActionResponse::Error {
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResponse::Success { success: true })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of the status table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatusView {
    pub table_name: String,
    pub status: TableStatus,
    pub percent: u32,
    pub transferred_rows: u64,
    pub total_rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&TableProgress> for TableStatusView {
    fn from(progress: &TableProgress) -> Self {
        Self {
            table_name: progress.table_name.clone(),
            status: progress.status,
            percent: progress.percent(),
            transferred_rows: progress.transferred_rows,
            total_rows: progress.total_rows,
            last_error: progress.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatusResponse {
    pub running: bool,
    pub state: OverallState,
    pub overall_percent: u32,
    pub transferred_rows: u64,
    pub total_rows: u64,
    pub tables: Vec<TableStatusView>,
}

impl From<&TransferSnapshot> for TransferStatusResponse {
    fn from(snapshot: &TransferSnapshot) -> Self {
        Self {
            running: snapshot.running,
            state: snapshot.state,
            overall_percent: snapshot.overall_percent,
            transferred_rows: snapshot.transferred_rows,
            total_rows: snapshot.total_rows,
            tables: snapshot.tables.iter().map(TableStatusView::from).collect(),
        }
    }
}

/// Start or resume a transfer; returns once the background copy is launched
pub async fn start_db_transfer(controller: &TransferController, url: &str) -> ActionResponse {
    if url.trim().is_empty() {
        return ActionResponse::error("Destination URL is required");
    }
    match controller.start(url).await {
        Ok(()) => ActionResponse::ok(),
        Err(e) => ActionResponse::error(e.to_string()),
    }
}

/// Request cooperative cancellation; succeeds even when nothing is running
pub fn cancel_db_transfer(controller: &TransferController) -> ActionResponse {
    controller.cancel();
    ActionResponse::ok()
}

pub fn get_transfer_status(controller: &TransferController) -> TransferStatusResponse {
    TransferStatusResponse::from(&controller.status())
}

pub async fn test_db_connection(
    controller: &TransferController,
    url: &str,
) -> ConnectionTestResponse {
    if url.trim().is_empty() {
        return ConnectionTestResponse {
            success: false,
            tables: None,
            error: Some("Destination URL is required".to_string()),
        };
    }
    match controller.test_connection(url).await {
        Ok(tables) => ConnectionTestResponse {
            success: true,
            tables: Some(tables),
            error: None,
        },
        Err(e) => ConnectionTestResponse {
            success: false,
            tables: None,
            error: Some(e.to_string()),
        },
    }
}

/// Discard saved progress; rejected while a transfer runs
pub fn reset_db_transfer(controller: &TransferController) -> ActionResponse {
    match controller.reset() {
        Ok(()) => ActionResponse::ok(),
        Err(e) => ActionResponse::error(e.to_string()),
    }
}
