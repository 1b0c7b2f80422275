// ABOUTME: Library module for db-transfer
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod api;
pub mod bridge;
pub mod checkpoint;
pub mod commands;
pub mod config;
pub mod error;
pub mod mysql;
pub mod plan;
pub mod progress;
pub mod sqlite;
pub mod store;
pub mod transfer;
pub mod transform;
pub mod utils;

pub use error::{TransferError, TransferResult};
pub use transfer::{TransferController, TransferSettings};
