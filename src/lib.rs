pub mod config;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

use config::PipelineSettings;
use pipeline::batch_extraction::{
    extraction_schema, load_raw_dataset, run_full_batch, BatchRunner, ExtractionError, RunSummary,
};
use pipeline::checkpoint::CheckpointStore;
use pipeline::generation::OllamaGenerator;
use pipeline::metrics::DatasetSummary;
use pipeline::normalize::{load_regimen_table, load_synonym_table, DrugNormalizer, RegimenMapper};

/// Initialize tracing once. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        config::verbose_log_filter()
    } else {
        config::default_log_filter()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();
}

fn checkpoint_store(settings: &PipelineSettings) -> CheckpointStore {
    CheckpointStore::new(&settings.checkpoint_file, &settings.backup_dir)
        .with_max_backups(settings.max_backups)
}

/// Run extraction over the configured dataset, resuming from the checkpoint.
///
/// Reference tables and the dataset are loaded up front; any failure there
/// aborts before the model is contacted. The model server is only checked
/// when the checkpoint is missing some records.
pub fn run(settings: &PipelineSettings) -> Result<RunSummary, ExtractionError> {
    settings
        .validate()
        .map_err(|e| ExtractionError::Config(e.to_string()))?;

    tracing::info!(
        "{} v{} starting (model {})",
        config::APP_NAME,
        config::APP_VERSION,
        settings.model_name
    );

    let normalizer = DrugNormalizer::new(load_synonym_table(&settings.drug_synonym_file)?)
        .with_threshold(settings.drug_match_threshold);
    let regimen_mapper = RegimenMapper::new(load_regimen_table(&settings.regimen_drug_file)?)
        .with_threshold(settings.regimen_match_threshold);
    let raw = load_raw_dataset(&settings.data_file)?;

    let generator = OllamaGenerator::new(
        &settings.ollama_url,
        &settings.model_name,
        settings.request_timeout_secs,
    )?
    .with_format(extraction_schema());

    let runner = BatchRunner::new(normalizer, regimen_mapper, settings.extraction_config());
    run_full_batch(
        &checkpoint_store(settings),
        &raw,
        &runner,
        &generator,
        &settings.sampling,
        None,
    )
}

/// Metrics over the current checkpoint, without running extraction.
pub fn report(settings: &PipelineSettings) -> DatasetSummary {
    let records = checkpoint_store(settings).load();
    DatasetSummary::from_records(&records)
}
