//! Flat CSV row form of a [`Record`].
//!
//! List-valued fields are stored as JSON arrays inside a single cell, and
//! the regimen map as a JSON object. Cells that fail to decode become empty
//! rather than failing the whole load.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::Record;
use crate::pipeline::metrics::EntityMetrics;

/// Column order of a written checkpoint. Matches the field order of
/// [`CheckpointRow`].
pub const CHECKPOINT_COLUMNS: [&str; 27] = [
    "unique_key",
    "text",
    "ground_truth_drugs",
    "ground_truth_regimens",
    "json_extraction",
    "extracted_drugs",
    "extracted_regimens",
    "drug_precision",
    "drug_recall",
    "drug_f1",
    "missing_drugs",
    "hallucinated_drugs",
    "regimen_precision",
    "regimen_recall",
    "regimen_f1",
    "missing_regimens",
    "hallucinated_regimens",
    "normalized_drugs",
    "normalized_drug_precision",
    "normalized_drug_recall",
    "normalized_drug_f1",
    "normalized_missing_drugs",
    "normalized_hallucinated_drugs",
    "combined_drugs",
    "mapped_regimen_drugs",
    "processing_timestamp",
    "error",
];

/// Columns a checkpoint must have to be loaded at all.
pub const REQUIRED_COLUMNS: [&str; 3] = ["unique_key", "text", "extracted_drugs"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRow {
    pub unique_key: String,
    pub text: String,
    #[serde(default)]
    pub ground_truth_drugs: String,
    #[serde(default)]
    pub ground_truth_regimens: String,
    #[serde(default)]
    pub json_extraction: String,
    pub extracted_drugs: String,
    #[serde(default)]
    pub extracted_regimens: String,
    #[serde(default)]
    pub drug_precision: Option<f64>,
    #[serde(default)]
    pub drug_recall: Option<f64>,
    #[serde(default)]
    pub drug_f1: Option<f64>,
    #[serde(default)]
    pub missing_drugs: String,
    #[serde(default)]
    pub hallucinated_drugs: String,
    #[serde(default)]
    pub regimen_precision: Option<f64>,
    #[serde(default)]
    pub regimen_recall: Option<f64>,
    #[serde(default)]
    pub regimen_f1: Option<f64>,
    #[serde(default)]
    pub missing_regimens: String,
    #[serde(default)]
    pub hallucinated_regimens: String,
    #[serde(default)]
    pub normalized_drugs: String,
    #[serde(default)]
    pub normalized_drug_precision: Option<f64>,
    #[serde(default)]
    pub normalized_drug_recall: Option<f64>,
    #[serde(default)]
    pub normalized_drug_f1: Option<f64>,
    #[serde(default)]
    pub normalized_missing_drugs: String,
    #[serde(default)]
    pub normalized_hallucinated_drugs: String,
    #[serde(default)]
    pub combined_drugs: String,
    #[serde(default)]
    pub mapped_regimen_drugs: String,
    #[serde(default)]
    pub processing_timestamp: String,
    #[serde(default)]
    pub error: Option<String>,
}

fn encode<T: Serialize + ?Sized>(value: &T, empty: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| empty.to_string())
}

fn decode_list(cell: &str) -> Vec<String> {
    if cell.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(cell) {
        Ok(list) => list,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed list cell, treating as empty");
            Vec::new()
        }
    }
}

fn decode_map(cell: &str) -> BTreeMap<String, Vec<String>> {
    if cell.trim().is_empty() {
        return BTreeMap::new();
    }
    match serde_json::from_str(cell) {
        Ok(map) => map,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed regimen map cell, treating as empty");
            BTreeMap::new()
        }
    }
}

fn decode_metrics(
    precision: Option<f64>,
    recall: Option<f64>,
    f1: Option<f64>,
    missing: &str,
    hallucinated: &str,
) -> EntityMetrics {
    EntityMetrics {
        precision: precision.unwrap_or(0.0),
        recall: recall.unwrap_or(0.0),
        f1: f1.unwrap_or(0.0),
        missing: decode_list(missing),
        hallucinated: decode_list(hallucinated),
    }
}

impl From<&Record> for CheckpointRow {
    fn from(r: &Record) -> Self {
        Self {
            unique_key: r.unique_key.clone(),
            text: r.text.clone(),
            ground_truth_drugs: encode(&r.ground_truth_drugs, "[]"),
            ground_truth_regimens: encode(&r.ground_truth_regimens, "[]"),
            json_extraction: r.json_extraction.clone(),
            extracted_drugs: encode(&r.extracted_drugs, "[]"),
            extracted_regimens: encode(&r.extracted_regimens, "[]"),
            drug_precision: Some(r.drug_metrics.precision),
            drug_recall: Some(r.drug_metrics.recall),
            drug_f1: Some(r.drug_metrics.f1),
            missing_drugs: encode(&r.drug_metrics.missing, "[]"),
            hallucinated_drugs: encode(&r.drug_metrics.hallucinated, "[]"),
            regimen_precision: Some(r.regimen_metrics.precision),
            regimen_recall: Some(r.regimen_metrics.recall),
            regimen_f1: Some(r.regimen_metrics.f1),
            missing_regimens: encode(&r.regimen_metrics.missing, "[]"),
            hallucinated_regimens: encode(&r.regimen_metrics.hallucinated, "[]"),
            normalized_drugs: encode(&r.normalized_drugs, "[]"),
            normalized_drug_precision: Some(r.normalized_drug_metrics.precision),
            normalized_drug_recall: Some(r.normalized_drug_metrics.recall),
            normalized_drug_f1: Some(r.normalized_drug_metrics.f1),
            normalized_missing_drugs: encode(&r.normalized_drug_metrics.missing, "[]"),
            normalized_hallucinated_drugs: encode(&r.normalized_drug_metrics.hallucinated, "[]"),
            combined_drugs: encode(&r.combined_drugs, "[]"),
            mapped_regimen_drugs: encode(&r.mapped_regimen_drugs, "{}"),
            processing_timestamp: r.processing_timestamp.clone(),
            error: r.error.clone(),
        }
    }
}

impl CheckpointRow {
    pub fn into_record(self) -> Record {
        Record {
            drug_metrics: decode_metrics(
                self.drug_precision,
                self.drug_recall,
                self.drug_f1,
                &self.missing_drugs,
                &self.hallucinated_drugs,
            ),
            regimen_metrics: decode_metrics(
                self.regimen_precision,
                self.regimen_recall,
                self.regimen_f1,
                &self.missing_regimens,
                &self.hallucinated_regimens,
            ),
            normalized_drug_metrics: decode_metrics(
                self.normalized_drug_precision,
                self.normalized_drug_recall,
                self.normalized_drug_f1,
                &self.normalized_missing_drugs,
                &self.normalized_hallucinated_drugs,
            ),
            ground_truth_drugs: decode_list(&self.ground_truth_drugs),
            ground_truth_regimens: decode_list(&self.ground_truth_regimens),
            extracted_drugs: decode_list(&self.extracted_drugs),
            extracted_regimens: decode_list(&self.extracted_regimens),
            normalized_drugs: decode_list(&self.normalized_drugs),
            combined_drugs: decode_list(&self.combined_drugs).into_iter().collect::<BTreeSet<_>>(),
            mapped_regimen_drugs: decode_map(&self.mapped_regimen_drugs),
            json_extraction: if self.json_extraction.is_empty() {
                "{}".to_string()
            } else {
                self.json_extraction
            },
            error: self.error.filter(|e| !e.is_empty()),
            unique_key: self.unique_key,
            text: self.text,
            processing_timestamp: self.processing_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_list_cell_decodes_empty() {
        assert!(decode_list("not json").is_empty());
        assert!(decode_list("{\"a\": 1}").is_empty());
        assert!(decode_list("").is_empty());
        assert_eq!(decode_list("[\"a\",\"b\"]"), vec!["a", "b"]);
    }

    #[test]
    fn malformed_map_cell_decodes_empty() {
        assert!(decode_map("[1,2]").is_empty());
        assert_eq!(decode_map("{\"chop\":[\"vincristine\"]}")["chop"], vec!["vincristine"]);
    }

    #[test]
    fn sparse_row_fills_defaults() {
        let row = CheckpointRow {
            unique_key: "k".to_string(),
            text: "t".to_string(),
            extracted_drugs: "[\"a\"]".to_string(),
            ..Default::default()
        };
        let record = row.into_record();
        assert_eq!(record.extracted_drugs, vec!["a"]);
        assert_eq!(record.json_extraction, "{}");
        assert_eq!(record.drug_metrics, EntityMetrics::default());
        assert!(record.error.is_none());
    }

    #[test]
    fn header_matches_serialized_field_order() {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(CheckpointRow::default()).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, CHECKPOINT_COLUMNS.join(","));
    }
}
