pub mod similarity;
pub mod drug;
pub mod regimen;
pub mod reference;

pub use drug::{DrugNormalizer, SynonymTable, DEFAULT_DRUG_THRESHOLD};
pub use regimen::{normalize_regimen_key, RegimenMapper, RegimenTable, DEFAULT_REGIMEN_THRESHOLD};
pub use reference::{load_regimen_table, load_synonym_table};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Cannot open reference file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed reference file {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}
