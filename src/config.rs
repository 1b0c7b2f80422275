// ABOUTME: Parses transfer configuration files and resolves the source database path
// ABOUTME: Converts TOML into validated TransferSettings and checkpoint backend choices

use crate::plan::select_tables;
use crate::transfer::{TransferSettings, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Source path used when neither flags, config, nor environment name one
pub const DEFAULT_SOURCE_PATH: &str = "app.db";

/// Environment variable naming the local database
pub const SOURCE_PATH_ENV: &str = "DATABASE_PATH";

const DEFAULT_CONNECT_RETRIES: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    pub source: SourceConfig,
    pub transfer: TransferSection,
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferSection {
    pub batch_size: Option<usize>,
    pub tables: Option<Vec<String>>,
    pub connect_retries: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    /// JSON document in the system temp dir, or at `checkpoint.path`
    #[default]
    File,
    /// `transfer_progress` table inside the source database, or the database at `checkpoint.path`
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    pub path: Option<PathBuf>,
}

impl TransferConfig {
    pub fn batch_size(&self) -> usize {
        self.transfer.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn connect_retries(&self) -> u32 {
        self.transfer
            .connect_retries
            .unwrap_or(DEFAULT_CONNECT_RETRIES)
    }

    /// Check ranges and table names
    pub fn validate(&self) -> Result<()> {
        let batch_size = self.batch_size();
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            bail!(
                "batch_size must be between 1 and {} (got {})",
                MAX_BATCH_SIZE,
                batch_size
            );
        }
        select_tables(self.transfer.tables.as_deref())?;
        Ok(())
    }

    pub fn settings(&self) -> TransferSettings {
        TransferSettings {
            batch_size: self.batch_size(),
            tables: self.transfer.tables.clone(),
        }
    }

    /// Source path by precedence: explicit flag, config file, `DATABASE_PATH`, default
    pub fn source_path(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.source.path.clone())
            .or_else(|| std::env::var(SOURCE_PATH_ENV).ok().filter(|p| !p.is_empty()))
            .unwrap_or_else(|| DEFAULT_SOURCE_PATH.to_string())
    }
}

pub fn load_config_from_file(path: &str) -> Result<TransferConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path))?;
    let parsed: TransferConfig =
        toml::from_str(&raw).with_context(|| format!("Failed to parse TOML config at {}", path))?;
    parsed
        .validate()
        .with_context(|| format!("Invalid config at {}", path))?;
    Ok(parsed)
}
