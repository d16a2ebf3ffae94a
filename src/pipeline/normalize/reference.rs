//! CSV loaders for the synonym and regimen reference tables.
//!
//! Synonym file columns: `DrugName`, `DrugSynonym` (comma separated).
//! Regimen file columns: `Regimen`, `Drugs` (comma separated).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::drug::SynonymTable;
use super::regimen::RegimenTable;
use super::ReferenceError;

#[derive(Debug, Deserialize)]
struct SynonymRow {
    #[serde(rename = "DrugName")]
    drug_name: String,
    #[serde(rename = "DrugSynonym", default)]
    drug_synonym: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegimenRow {
    #[serde(rename = "Regimen")]
    regimen: String,
    #[serde(rename = "Drugs", default)]
    drugs: Option<String>,
}

fn split_list(cell: Option<&str>) -> Vec<&str> {
    cell.map(|c| c.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn open(path: &Path) -> Result<File, ReferenceError> {
    File::open(path).map_err(|source| ReferenceError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load the synonym table from a CSV file.
pub fn load_synonym_table(path: &Path) -> Result<SynonymTable, ReferenceError> {
    let table = read_synonym_table(open(path)?).map_err(|source| ReferenceError::Csv {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), synonyms = table.len(), "Loaded drug synonyms");
    Ok(table)
}

/// Read a synonym table from any CSV source.
pub fn read_synonym_table<R: Read>(reader: R) -> Result<SynonymTable, csv::Error> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut groups = Vec::new();
    for row in csv_reader.deserialize::<SynonymRow>() {
        let row = row?;
        let synonyms: Vec<String> = split_list(row.drug_synonym.as_deref())
            .into_iter()
            .map(str::to_string)
            .collect();
        groups.push((row.drug_name, synonyms));
    }
    Ok(SynonymTable::from_groups(groups))
}

/// Load the regimen table from a CSV file.
pub fn load_regimen_table(path: &Path) -> Result<RegimenTable, ReferenceError> {
    let table = read_regimen_table(open(path)?).map_err(|source| ReferenceError::Csv {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), regimens = table.len(), "Loaded regimen mappings");
    Ok(table)
}

/// Read a regimen table from any CSV source.
pub fn read_regimen_table<R: Read>(reader: R) -> Result<RegimenTable, csv::Error> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut table = RegimenTable::new();
    for row in csv_reader.deserialize::<RegimenRow>() {
        let row = row?;
        table.insert(&row.regimen, &split_list(row.drugs.as_deref()));
    }
    Ok(table)
}
