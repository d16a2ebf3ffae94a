//! Error types for the batch extraction pipeline.

use thiserror::Error;

use crate::pipeline::checkpoint::CheckpointError;
use crate::pipeline::generation::GenerationError;
use crate::pipeline::normalize::ReferenceError;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Reference data error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Cannot merge batch results: {0}")]
    Merge(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Cannot open dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed dataset {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}
