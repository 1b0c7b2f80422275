// ABOUTME: Transfer orchestration: per-table batch copier and the controller state machine
// ABOUTME: The controller owns the single background job and publishes progress

pub mod controller;
pub mod copier;

pub use controller::{TransferController, TransferSettings};
pub use copier::{copy_table, CopyContext, CopyOutcome};

/// Default rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Largest accepted batch size
pub const MAX_BATCH_SIZE: usize = 10_000;
