//! Durable, resumable storage of processed records.
//!
//! The checkpoint is a CSV file rewritten atomically after every batch.
//! Each overwrite is preceded by a timestamped backup, and a file that
//! cannot be parsed is quarantined instead of being silently discarded.

pub mod backup;
pub mod row;
pub mod store;

pub use backup::{create_backup, list_backups, prune_backups, BACKUP_PREFIX, MAX_BACKUPS};
pub use row::{CheckpointRow, CHECKPOINT_COLUMNS, REQUIRED_COLUMNS};
pub use store::CheckpointStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Checkpoint is missing required column: {0}")]
    MissingColumn(String),

    #[error("Checkpoint row {row} has an empty unique_key")]
    EmptyKey { row: usize },

    #[error("Cannot replace checkpoint {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
