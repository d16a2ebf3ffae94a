//! Record types for the three pipeline stages.
//!
//! A record moves through the pipeline as three separate values:
//! `RawRecord` (dataset row) → `Extraction` (generator output for that row)
//! → `Record` (assembled, scored, checkpointed). Each value is built once and
//! never patched field by field.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::pipeline::metrics::{compute_entity_metrics, EntityMetrics};
use crate::pipeline::normalize::{DrugNormalizer, RegimenMapper};

/// Maximum length of any error message stored on a record or logged.
pub const MAX_ERROR_CHARS: usize = 200;

/// Truncate a message to at most [`MAX_ERROR_CHARS`] characters.
pub fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}

/// Current local time in the format stored in `processing_timestamp`.
pub fn processing_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// One clinical-text unit as loaded from the raw dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub unique_key: String,
    pub text: String,
    /// Lowercase, trimmed.
    pub ground_truth_drugs: Vec<String>,
    /// Lowercase, trimmed.
    pub ground_truth_regimens: Vec<String>,
}

/// Generator output for a single raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub unique_key: String,
    pub extracted_drugs: Vec<String>,
    pub extracted_regimens: Vec<String>,
    /// Parsed payload re-serialized as JSON, `{}` when nothing was parsed.
    pub json_extraction: String,
    pub processing_timestamp: String,
    pub error: Option<String>,
}

impl Extraction {
    /// An empty-entity extraction carrying a truncated error message.
    pub fn degraded(unique_key: &str, error: &str) -> Self {
        Self {
            unique_key: unique_key.to_string(),
            extracted_drugs: vec![],
            extracted_regimens: vec![],
            json_extraction: "{}".to_string(),
            processing_timestamp: processing_timestamp(),
            error: Some(truncate_message(error)),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// A fully processed record, as stored in the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub unique_key: String,
    pub text: String,
    pub ground_truth_drugs: Vec<String>,
    pub ground_truth_regimens: Vec<String>,
    pub json_extraction: String,
    pub extracted_drugs: Vec<String>,
    pub extracted_regimens: Vec<String>,
    /// Raw extracted drugs against ground truth.
    pub drug_metrics: EntityMetrics,
    /// Extracted regimens against ground truth.
    pub regimen_metrics: EntityMetrics,
    pub normalized_drugs: Vec<String>,
    /// Normalized drugs against (raw) ground truth.
    pub normalized_drug_metrics: EntityMetrics,
    pub combined_drugs: BTreeSet<String>,
    /// Each extracted regimen with the drugs it resolved to (empty if unresolved).
    pub mapped_regimen_drugs: BTreeMap<String, Vec<String>>,
    pub processing_timestamp: String,
    pub error: Option<String>,
}

impl Record {
    /// Build the checkpointed record from a raw row and its extraction.
    ///
    /// Metrics are computed for raw drugs, normalized drugs and regimens.
    /// Normalized drugs are scored against the raw ground truth. Combined
    /// drugs start from the normalized drugs, not the raw extracted names, so
    /// a brand name or abbreviation appears under its canonical name. Every
    /// drug of a resolved regimen is added to them.
    pub fn assemble(
        raw: &RawRecord,
        extraction: Extraction,
        normalizer: &DrugNormalizer,
        mapper: &RegimenMapper,
    ) -> Self {
        let drug_metrics = compute_entity_metrics(&extraction.extracted_drugs, &raw.ground_truth_drugs);
        let regimen_metrics =
            compute_entity_metrics(&extraction.extracted_regimens, &raw.ground_truth_regimens);

        let normalized_drugs = normalizer.normalize_list(&extraction.extracted_drugs);
        let normalized_drug_metrics = compute_entity_metrics(&normalized_drugs, &raw.ground_truth_drugs);

        let combined_drugs = mapper.get_combined_drugs(&normalized_drugs, &extraction.extracted_regimens);
        let mapped_regimen_drugs = mapper.map_regimens(&extraction.extracted_regimens);

        Self {
            unique_key: raw.unique_key.clone(),
            text: raw.text.clone(),
            ground_truth_drugs: raw.ground_truth_drugs.clone(),
            ground_truth_regimens: raw.ground_truth_regimens.clone(),
            json_extraction: extraction.json_extraction,
            extracted_drugs: extraction.extracted_drugs,
            extracted_regimens: extraction.extracted_regimens,
            drug_metrics,
            regimen_metrics,
            normalized_drugs,
            normalized_drug_metrics,
            combined_drugs,
            mapped_regimen_drugs,
            processing_timestamp: extraction.processing_timestamp,
            error: extraction.error,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
