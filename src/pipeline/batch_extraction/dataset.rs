//! Raw dataset loading.
//!
//! Expected columns: `patient_id_number`, `tumor_record_number`,
//! `admission_id`, `text_concat`, `unique_drugs`, `regimens`. The record key
//! is `<patient>_<tumor>_<admission>`; ground-truth cells are `", "`
//! separated lists.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::error::DatasetError;
use crate::models::RawRecord;

#[derive(Debug, Deserialize)]
struct DatasetRow {
    patient_id_number: String,
    tumor_record_number: String,
    admission_id: String,
    text_concat: String,
    #[serde(default)]
    unique_drugs: Option<String>,
    #[serde(default)]
    regimens: Option<String>,
}

/// `patient_tumor_admission`
pub fn unique_key(patient_id: &str, tumor_record: &str, admission_id: &str) -> String {
    format!(
        "{}_{}_{}",
        patient_id.trim(),
        tumor_record.trim(),
        admission_id.trim()
    )
}

/// Split a ground-truth cell on `", "`, lowercase and trim each entry, and
/// drop blanks. A missing cell is an empty list.
pub fn ground_truth_list(cell: Option<&str>) -> Vec<String> {
    cell.map(|c| {
        c.split(", ")
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Load the raw dataset from a CSV file.
pub fn load_raw_dataset(path: &Path) -> Result<Vec<RawRecord>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let records = read_raw_dataset(file).map_err(|source| DatasetError::Csv {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), records = records.len(), "Loaded raw dataset");
    Ok(records)
}

/// Read raw records from any CSV source, in file order.
pub fn read_raw_dataset<R: Read>(reader: R) -> Result<Vec<RawRecord>, csv::Error> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize::<DatasetRow>() {
        let row = row?;
        records.push(RawRecord {
            unique_key: unique_key(&row.patient_id_number, &row.tumor_record_number, &row.admission_id),
            text: row.text_concat,
            ground_truth_drugs: ground_truth_list(row.unique_drugs.as_deref()),
            ground_truth_regimens: ground_truth_list(row.regimens.as_deref()),
        });
    }
    Ok(records)
}
