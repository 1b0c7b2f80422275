// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Shared wiring from configuration to stores and controller lives here

pub mod bridge;
pub mod connection;
pub mod reset;
pub mod start;
pub mod status;

pub use bridge::bridge;
pub use connection::test_connection;
pub use reset::reset;
pub use start::start;
pub use status::status;

use crate::checkpoint::{checkpoint_path, CheckpointStore, JsonCheckpointStore};
use crate::config::{load_config_from_file, CheckpointBackend, TransferConfig};
use crate::mysql::MysqlConnector;
use crate::sqlite::{SqliteCheckpointStore, SqliteSource};
use crate::transfer::TransferController;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Load the config file if one was given, otherwise defaults
pub fn load_config(path: Option<&str>) -> Result<TransferConfig> {
    match path {
        Some(path) => load_config_from_file(path),
        None => Ok(TransferConfig::default()),
    }
}

/// Open the checkpoint backend selected by `config`
pub fn open_checkpoints(
    config: &TransferConfig,
    source_path: &str,
) -> Result<Arc<dyn CheckpointStore>> {
    match config.checkpoint.backend {
        CheckpointBackend::File => {
            let path = match &config.checkpoint.path {
                Some(path) => path.clone(),
                None => checkpoint_path(source_path)?,
            };
            tracing::debug!("Using checkpoint file {}", path.display());
            Ok(Arc::new(JsonCheckpointStore::new(path)))
        }
        CheckpointBackend::Sqlite => {
            let path = config
                .checkpoint
                .path
                .clone()
                .unwrap_or_else(|| source_path.into());
            tracing::debug!("Using transfer_progress table in {}", path.display());
            Ok(Arc::new(SqliteCheckpointStore::open(&path)?))
        }
    }
}

/// Wire source, destination connector, and checkpoints into a controller
pub fn build_controller(config: &TransferConfig, source_path: &str) -> Result<TransferController> {
    let source = SqliteSource::open(source_path)
        .with_context(|| format!("Source database unavailable at {}", source_path))?;
    let checkpoints = open_checkpoints(config, source_path)?;

    Ok(TransferController::new(
        Arc::new(source),
        Arc::new(MysqlConnector::new(config.connect_retries())),
        checkpoints,
        config.settings(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointRecord;
    use crate::config::CheckpointConfig;
    use crate::progress::TableProgress;

    #[test]
    fn test_open_checkpoints_honors_explicit_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransferConfig {
            checkpoint: CheckpointConfig {
                backend: CheckpointBackend::File,
                path: Some(dir.path().join("progress.json")),
            },
            ..Default::default()
        };

        let store = open_checkpoints(&config, "unused.db").unwrap();
        store
            .save(&CheckpointRecord::from_progress(
                &TableProgress::new("telegram_accounts", 3),
                "dest",
            ))
            .unwrap();

        assert!(dir.path().join("progress.json").exists());
    }

    #[test]
    fn test_open_checkpoints_sqlite_defaults_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("app.db");
        let config = TransferConfig {
            checkpoint: CheckpointConfig {
                backend: CheckpointBackend::Sqlite,
                path: None,
            },
            ..Default::default()
        };

        let store = open_checkpoints(&config, db_path.to_str().unwrap()).unwrap();
        assert!(store.load().unwrap().is_empty());

        let conn = rusqlite::Connection::open(&db_path).unwrap();
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'transfer_progress'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(exists, 1);
    }

    #[test]
    fn test_build_controller_requires_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.db");
        let err = build_controller(&TransferConfig::default(), missing.to_str().unwrap())
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("Source database unavailable"));
    }
}
