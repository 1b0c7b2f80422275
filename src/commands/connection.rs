// ABOUTME: test-connection command: verifies a destination before transferring
// ABOUTME: Lists destination tables without touching saved progress

use crate::mysql::MysqlConnector;
use crate::store::DestinationConnector;
use crate::utils::mask_url;
use anyhow::{Context, Result};

/// Connect to `target`, list its tables, and disconnect
pub async fn test_connection(target: &str, retries: u32) -> Result<Vec<String>> {
    tracing::info!("Testing connection to {}", mask_url(target));

    let destination = MysqlConnector::new(retries)
        .connect(target)
        .await
        .context("Connection test failed")?;
    let tables = destination.list_tables().await;
    if let Err(e) = destination.close().await {
        tracing::warn!("Failed to close destination connection: {:#}", e);
    }
    let tables = tables.context("Connected, but could not list tables")?;

    tracing::info!("✓ Connected ({} tables found)", tables.len());
    for table in &tables {
        tracing::info!("  - {}", table);
    }

    Ok(tables)
}
