//! Core types for the batch extraction pipeline.
//!
//! A run moves through:
//! LoadCheckpoint → ComputeBacklog → (BatchInProgress ⇄ Persist) → Done | Failed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::metrics::DatasetSummary;

// ═══════════════════════════════════════════
// Run State
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    LoadCheckpoint,
    ComputeBacklog,
    BatchInProgress,
    Persist,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadCheckpoint => "load_checkpoint",
            Self::ComputeBacklog => "compute_backlog",
            Self::BatchInProgress => "batch_in_progress",
            Self::Persist => "persist",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Batch Status Events
// ═══════════════════════════════════════════

/// Progress notification delivered to the optional run callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchStatusEvent {
    Started {
        checkpoint_records: usize,
        backlog: usize,
        total_batches: usize,
    },
    Progress {
        batch: usize,
        total_batches: usize,
        records: usize,
    },
    BatchPersisted {
        batch: usize,
        total_batches: usize,
        processed: usize,
        degraded: usize,
        duration_ms: u64,
    },
    Completed {
        processed: usize,
        degraded: usize,
        duration_ms: u64,
    },
}

// ═══════════════════════════════════════════
// Run Summary (output of run_full_batch)
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    /// Model named in the run configuration.
    pub model_name: String,
    pub state: RunState,
    /// Records already in the checkpoint when the run started.
    pub checkpoint_records: usize,
    pub backlog: usize,
    /// Records processed by this run, degraded ones included.
    pub processed: usize,
    pub degraded: usize,
    pub batches: usize,
    pub duration_ms: u64,
    /// Metrics over the whole checkpoint after the run.
    pub summary: DatasetSummary,
}

// ═══════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════

/// Configuration for the extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Model used for extraction (e.g., "llama3.1:8b").
    pub model_name: String,
    /// Records per generator call.
    pub batch_size: usize,
    /// Generator attempts per batch, first attempt included.
    pub max_retries: u32,
    /// Pause between failed attempts.
    pub retry_delay: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model_name: "llama3.1:8b".to_string(),
            batch_size: 40,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}
