//! Resumable batch extraction pipeline.
//!
//! ```text
//! Dataset → backlog (keys not in checkpoint) → prompt → Generator
//!         → parse → Record::assemble → CheckpointStore (after every batch)
//! ```
//!
//! Failures at the batch or record level become degraded records with an
//! error message; only checkpoint persistence and merge failures stop a run.

pub mod error;
pub mod types;
pub mod dataset;
pub mod prompt;
pub mod parse;
pub mod runner;

pub use error::{DatasetError, ExtractionError};
pub use types::*;
pub use dataset::{load_raw_dataset, read_raw_dataset};
pub use prompt::{extraction_schema, format_prompt};
pub use parse::{parse_output, EntityPayload, ParsedOutput};
pub use runner::{compute_backlog, run_full_batch, BatchRunner};
