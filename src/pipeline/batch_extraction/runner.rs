//! BatchRunner: orchestrates a resumable extraction run.
//!
//! Checkpoint → backlog → batches (generate, parse, assemble) → persist after
//! every batch. Runs sequentially: one generator call at a time.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::error::ExtractionError;
use super::parse::parse_output;
use super::prompt::format_prompt;
use super::types::*;
use crate::models::{processing_timestamp, truncate_message, Extraction, RawRecord, Record};
use crate::pipeline::checkpoint::CheckpointStore;
use crate::pipeline::generation::{GenerationError, GenerationOutput, Generator, SamplingConfig};
use crate::pipeline::metrics::DatasetSummary;
use crate::pipeline::normalize::{DrugNormalizer, RegimenMapper};

/// Turns raw records into scored records, one batch at a time.
pub struct BatchRunner {
    normalizer: DrugNormalizer,
    regimen_mapper: RegimenMapper,
    config: ExtractionConfig,
}

impl BatchRunner {
    pub fn new(normalizer: DrugNormalizer, regimen_mapper: RegimenMapper, config: ExtractionConfig) -> Self {
        Self {
            normalizer,
            regimen_mapper,
            config,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Call the generator, retrying whole-batch failures up to
    /// `max_retries` attempts in total.
    fn generate_with_retry(
        &self,
        generator: &dyn Generator,
        prompts: &[String],
        sampling: &SamplingConfig,
    ) -> Result<Vec<GenerationOutput>, GenerationError> {
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match generator.generate(prompts, sampling) {
                Ok(outputs) => return Ok(outputs),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        retry_in_ms = self.config.retry_delay.as_millis() as u64,
                        error = %truncate_message(&e.to_string()),
                        "Generation attempt failed, retrying"
                    );
                    std::thread::sleep(self.config.retry_delay);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        attempts,
                        error = %truncate_message(&e.to_string()),
                        "Generation failed after all attempts"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Extract entities for every record in the batch.
    ///
    /// Never fails: a batch-level failure degrades every record, and a bad or
    /// missing per-record output degrades only that record.
    pub fn extract_batch(
        &self,
        batch: &[&RawRecord],
        generator: &dyn Generator,
        sampling: &SamplingConfig,
    ) -> Vec<Extraction> {
        let prompts: Vec<String> = batch.iter().map(|r| format_prompt(&r.text)).collect();

        let outputs = match self.generate_with_retry(generator, &prompts, sampling) {
            Ok(outputs) => outputs,
            Err(e) => {
                let message = format!("Batch failed: {e}");
                return batch
                    .iter()
                    .map(|r| Extraction::degraded(&r.unique_key, &message))
                    .collect();
            }
        };

        if outputs.len() != batch.len() {
            tracing::warn!(
                expected = batch.len(),
                received = outputs.len(),
                "Generator returned a different number of outputs than prompts"
            );
        }

        let mut outputs = outputs.into_iter();
        batch
            .iter()
            .map(|record| match outputs.next() {
                Some(output) => self.extraction_from_output(record, &output),
                None => Extraction::degraded(&record.unique_key, "No model output for record"),
            })
            .collect()
    }

    fn extraction_from_output(&self, record: &RawRecord, output: &GenerationOutput) -> Extraction {
        match parse_output(output) {
            Ok(parsed) => Extraction {
                unique_key: record.unique_key.clone(),
                extracted_drugs: parsed.payload.drugs,
                extracted_regimens: parsed.payload.regimens,
                json_extraction: parsed.raw_json,
                processing_timestamp: processing_timestamp(),
                error: None,
            },
            Err(e) => {
                tracing::warn!(
                    unique_key = %record.unique_key,
                    error = %truncate_message(&e.to_string()),
                    "Unusable model output, degrading record"
                );
                Extraction::degraded(&record.unique_key, &e.to_string())
            }
        }
    }

    /// Join extractions to their raw records by key and assemble the final
    /// records, in batch order.
    pub fn merge(
        &self,
        batch: &[&RawRecord],
        extractions: Vec<Extraction>,
    ) -> Result<Vec<Record>, ExtractionError> {
        let mut by_key: HashMap<String, Extraction> = HashMap::with_capacity(extractions.len());
        for extraction in extractions {
            if !batch.iter().any(|r| r.unique_key == extraction.unique_key) {
                return Err(ExtractionError::Merge(format!(
                    "extraction for unknown key {}",
                    extraction.unique_key
                )));
            }
            let key = extraction.unique_key.clone();
            if by_key.insert(key.clone(), extraction).is_some() {
                return Err(ExtractionError::Merge(format!("duplicate extraction for key {key}")));
            }
        }

        batch
            .iter()
            .map(|raw| {
                let extraction = by_key.remove(&raw.unique_key).ok_or_else(|| {
                    ExtractionError::Merge(format!("no extraction for key {}", raw.unique_key))
                })?;
                Ok(Record::assemble(raw, extraction, &self.normalizer, &self.regimen_mapper))
            })
            .collect()
    }

    /// Extract and assemble one batch.
    pub fn process_batch(
        &self,
        batch: &[&RawRecord],
        generator: &dyn Generator,
        sampling: &SamplingConfig,
    ) -> Result<Vec<Record>, ExtractionError> {
        let extractions = self.extract_batch(batch, generator, sampling);
        self.merge(batch, extractions)
    }
}

/// Raw records not yet in the checkpoint, in dataset order. A key repeated
/// in the dataset is taken once, at its first occurrence.
pub fn compute_backlog<'a>(raw: &'a [RawRecord], checkpoint: &[Record]) -> Vec<&'a RawRecord> {
    let mut seen: HashSet<&str> = checkpoint.iter().map(|r| r.unique_key.as_str()).collect();
    let mut backlog = Vec::new();
    for record in raw {
        if seen.insert(record.unique_key.as_str()) {
            backlog.push(record);
        }
    }
    backlog
}

/// Run the full pipeline: load the checkpoint, process the backlog in
/// batches and persist after every batch.
///
/// The generator is only asked to confirm it is ready once there is a
/// backlog. A persistence failure is fatal. If merging a batch fails, the
/// progress so far is saved before the batch error is returned.
pub fn run_full_batch(
    store: &CheckpointStore,
    raw: &[RawRecord],
    runner: &BatchRunner,
    generator: &dyn Generator,
    sampling: &SamplingConfig,
    progress_fn: Option<&dyn Fn(BatchStatusEvent)>,
) -> Result<RunSummary, ExtractionError> {
    let start = Instant::now();
    let run_id = uuid::Uuid::new_v4().to_string();

    tracing::debug!(run_id = %run_id, state = %RunState::LoadCheckpoint, "Run state");
    let mut records = store.load();
    let checkpoint_records = records.len();

    tracing::debug!(run_id = %run_id, state = %RunState::ComputeBacklog, "Run state");
    let backlog = compute_backlog(raw, &records);

    if backlog.is_empty() {
        tracing::info!(run_id = %run_id, records = checkpoint_records, "All data processed");
        return Ok(RunSummary {
            run_id,
            model_name: runner.config.model_name.clone(),
            state: RunState::Done,
            checkpoint_records,
            backlog: 0,
            processed: 0,
            degraded: 0,
            batches: 0,
            duration_ms: start.elapsed().as_millis() as u64,
            summary: DatasetSummary::from_records(&records),
        });
    }

    if let Err(e) = generator.ensure_ready() {
        tracing::error!(
            run_id = %run_id,
            state = %RunState::Failed,
            model = %runner.config.model_name,
            error = %truncate_message(&e.to_string()),
            "Generator is not ready"
        );
        return Err(e.into());
    }

    let batch_size = runner.config.batch_size.max(1);
    let total_batches = backlog.len().div_ceil(batch_size);
    tracing::info!(
        run_id = %run_id,
        model = %runner.config.model_name,
        checkpoint_records,
        backlog = backlog.len(),
        batch_size,
        total_batches,
        "Processing new records"
    );

    if let Some(progress) = progress_fn {
        progress(BatchStatusEvent::Started {
            checkpoint_records,
            backlog: backlog.len(),
            total_batches,
        });
    }

    let mut processed = 0;
    let mut degraded = 0;

    for (i, batch) in backlog.chunks(batch_size).enumerate() {
        let batch_number = i + 1;
        let batch_start = Instant::now();

        if let Some(progress) = progress_fn {
            progress(BatchStatusEvent::Progress {
                batch: batch_number,
                total_batches,
                records: batch.len(),
            });
        }

        tracing::debug!(run_id = %run_id, state = %RunState::BatchInProgress, batch = batch_number, "Run state");
        let assembled = match runner.process_batch(batch, generator, sampling) {
            Ok(assembled) => assembled,
            Err(e) => {
                tracing::error!(
                    run_id = %run_id,
                    state = %RunState::Failed,
                    batch = batch_number,
                    error = %truncate_message(&e.to_string()),
                    "Batch processing failed, saving progress"
                );
                return Err(save_after_failure(store, &records, e));
            }
        };

        let batch_degraded = assembled.iter().filter(|r| r.is_degraded()).count();
        processed += assembled.len();
        degraded += batch_degraded;
        records.extend(assembled);

        tracing::debug!(run_id = %run_id, state = %RunState::Persist, batch = batch_number, "Run state");
        if let Err(e) = store.save(&records) {
            tracing::error!(run_id = %run_id, state = %RunState::Failed, "Cannot persist checkpoint");
            return Err(e.into());
        }

        let batch_ms = batch_start.elapsed().as_millis() as u64;
        let records_per_second = if batch_ms > 0 {
            batch.len() as f64 * 1000.0 / batch_ms as f64
        } else {
            0.0
        };
        tracing::info!(
            run_id = %run_id,
            batch = batch_number,
            total_batches,
            records = batch.len(),
            degraded = batch_degraded,
            duration_ms = batch_ms,
            records_per_second = %format!("{records_per_second:.2}"),
            progress = %format!("{}/{}", processed, backlog.len()),
            "Batch completed"
        );

        if let Some(progress) = progress_fn {
            progress(BatchStatusEvent::BatchPersisted {
                batch: batch_number,
                total_batches,
                processed,
                degraded,
                duration_ms: batch_ms,
            });
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(run_id = %run_id, processed, degraded, duration_ms, "Pipeline completed");

    if let Some(progress) = progress_fn {
        progress(BatchStatusEvent::Completed {
            processed,
            degraded,
            duration_ms,
        });
    }

    Ok(RunSummary {
        run_id,
        model_name: runner.config.model_name.clone(),
        state: RunState::Done,
        checkpoint_records,
        backlog: backlog.len(),
        processed,
        degraded,
        batches: total_batches,
        duration_ms,
        summary: DatasetSummary::from_records(&records),
    })
}

/// Save the progress made before `error`, then hand `error` back. A failed
/// save is logged by the store and does not replace the original error.
fn save_after_failure(store: &CheckpointStore, records: &[Record], error: ExtractionError) -> ExtractionError {
    if store.save(records).is_err() {
        tracing::error!(
            records = records.len(),
            error = %truncate_message(&error.to_string()),
            "Progress was not saved after batch failure"
        );
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    use serde_json::json;

    use crate::pipeline::checkpoint::list_backups;
    use crate::pipeline::normalize::{RegimenTable, SynonymTable};

    type Script = Box<dyn Fn(usize, &[String]) -> Result<Vec<GenerationOutput>, GenerationError>>;

    /// Generator driven by a closure of (call number, prompts).
    struct ScriptedGenerator {
        calls: Cell<usize>,
        prompts: RefCell<Vec<String>>,
        script: Script,
    }

    impl ScriptedGenerator {
        fn new(script: impl Fn(usize, &[String]) -> Result<Vec<GenerationOutput>, GenerationError> + 'static) -> Self {
            Self {
                calls: Cell::new(0),
                prompts: RefCell::new(Vec::new()),
                script: Box::new(script),
            }
        }

        fn answering(payload: serde_json::Value) -> Self {
            Self::new(move |_, prompts| {
                Ok(prompts
                    .iter()
                    .map(|_| GenerationOutput::Structured(payload.clone()))
                    .collect())
            })
        }

        fn failing() -> Self {
            Self::new(|_, _| Err(GenerationError::Connection("http://localhost:11434".into())))
        }
    }

    /// Answers prompts but reports the model as missing.
    struct UnavailableGenerator(ScriptedGenerator);

    impl Generator for UnavailableGenerator {
        fn generate(
            &self,
            prompts: &[String],
            sampling: &SamplingConfig,
        ) -> Result<Vec<GenerationOutput>, GenerationError> {
            self.0.generate(prompts, sampling)
        }

        fn ensure_ready(&self) -> Result<(), GenerationError> {
            Err(GenerationError::NoModelAvailable("test-model".into()))
        }
    }

    impl Generator for ScriptedGenerator {
        fn generate(
            &self,
            prompts: &[String],
            _sampling: &SamplingConfig,
        ) -> Result<Vec<GenerationOutput>, GenerationError> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            self.prompts.borrow_mut().extend(prompts.iter().cloned());
            (self.script)(call, prompts)
        }
    }

    fn oncology_payload() -> serde_json::Value {
        json!({ "drugs": ["Oncovin", "rituximab"], "regimens": ["CHOP Protocol"] })
    }

    fn make_runner(batch_size: usize) -> BatchRunner {
        let synonyms = SynonymTable::from_groups(vec![("vincristine", vec!["oncovin", "vcr"])]);
        let mut regimens = RegimenTable::new();
        regimens.insert("CHOP", &["cyclophosphamide", "doxorubicin", "vincristine", "prednisone"]);
        BatchRunner::new(
            DrugNormalizer::new(synonyms),
            RegimenMapper::new(regimens),
            ExtractionConfig {
                model_name: "test-model".to_string(),
                batch_size,
                max_retries: 3,
                retry_delay: Duration::ZERO,
            },
        )
    }

    fn raw(n: usize) -> Vec<RawRecord> {
        (1..=n)
            .map(|i| RawRecord {
                unique_key: format!("p{i}_1_a{i}"),
                text: format!("Note {i}: started CHOP with Oncovin."),
                ground_truth_drugs: vec!["vincristine".to_string(), "rituximab".to_string()],
                ground_truth_regimens: vec!["chop".to_string()],
            })
            .collect()
    }

    fn store_in(dir: &std::path::Path) -> CheckpointStore {
        CheckpointStore::new(dir.join("checkpoint.csv"), dir.join("checkpoint_backups"))
    }

    #[test]
    fn successful_run_scores_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let generator = ScriptedGenerator::answering(oncology_payload());

        let summary = run_full_batch(&store, &raw(3), &make_runner(40), &generator, &SamplingConfig::default(), None)
            .unwrap();

        assert_eq!(summary.state, RunState::Done);
        assert_eq!(summary.model_name, "test-model");
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.degraded, 0);
        assert_eq!(summary.batches, 1);
        assert_eq!(generator.calls.get(), 1);

        let records = store.load();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].normalized_drugs, vec!["vincristine", "rituximab"]);
        assert_eq!(records[0].normalized_drug_metrics.f1, 1.0);
        assert!(records[0].combined_drugs.contains("prednisone"));
        assert!((summary.summary.drug.mean_precision - 0.5).abs() < 1e-9);
    }

    #[test]
    fn all_failing_batch_is_checkpointed_as_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let generator = ScriptedGenerator::failing();

        let summary = run_full_batch(&store, &raw(4), &make_runner(40), &generator, &SamplingConfig::default(), None)
            .unwrap();

        assert_eq!(generator.calls.get(), 3);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.degraded, 4);

        let records = store.load();
        assert_eq!(records.len(), 4);
        for record in &records {
            let error = record.error.as_deref().unwrap();
            assert!(error.starts_with("Batch failed:"), "got {error}");
            assert!(error.chars().count() <= 200);
            assert!(record.extracted_drugs.is_empty());
            assert_eq!(record.drug_metrics.recall, 0.0);
        }
    }

    #[test]
    fn transient_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let payload = oncology_payload();
        let generator = ScriptedGenerator::new(move |call, prompts| {
            if call == 0 {
                Err(GenerationError::HttpClient("Request timed out after 300s".into()))
            } else {
                Ok(prompts.iter().map(|_| GenerationOutput::Structured(payload.clone())).collect())
            }
        });

        let summary = run_full_batch(&store, &raw(2), &make_runner(40), &generator, &SamplingConfig::default(), None)
            .unwrap();

        assert_eq!(generator.calls.get(), 2);
        assert_eq!(summary.degraded, 0);
    }

    #[test]
    fn single_attempt_when_retries_is_zero() {
        let mut runner = make_runner(40);
        runner.config.max_retries = 0;
        let generator = ScriptedGenerator::failing();
        let records = raw(1);
        let batch: Vec<&RawRecord> = records.iter().collect();

        let extractions = runner.extract_batch(&batch, &generator, &SamplingConfig::default());

        assert_eq!(generator.calls.get(), 1);
        assert!(extractions[0].is_degraded());
    }

    #[test]
    fn malformed_output_degrades_only_that_record() {
        let generator = ScriptedGenerator::new(|_, prompts| {
            let mut outputs: Vec<GenerationOutput> = prompts
                .iter()
                .map(|_| GenerationOutput::Text("{\"drugs\": [\"cisplatin\"], \"regimens\": []}".into()))
                .collect();
            outputs[1] = GenerationOutput::Text("Sorry, I cannot help with that.".into());
            Ok(outputs)
        });
        let runner = make_runner(40);
        let records = raw(3);
        let batch: Vec<&RawRecord> = records.iter().collect();

        let assembled = runner.process_batch(&batch, &generator, &SamplingConfig::default()).unwrap();

        assert!(!assembled[0].is_degraded());
        assert!(assembled[1].is_degraded());
        assert_eq!(assembled[1].json_extraction, "{}");
        assert!(!assembled[2].is_degraded());
        assert_eq!(assembled[2].extracted_drugs, vec!["cisplatin"]);
    }

    #[test]
    fn short_output_list_degrades_unanswered_records() {
        let generator = ScriptedGenerator::new(|_, _| {
            Ok(vec![GenerationOutput::Structured(json!({ "drugs": [], "regimens": [] }))])
        });
        let runner = make_runner(40);
        let records = raw(3);
        let batch: Vec<&RawRecord> = records.iter().collect();

        let assembled = runner.process_batch(&batch, &generator, &SamplingConfig::default()).unwrap();

        assert_eq!(assembled.len(), 3);
        assert!(!assembled[0].is_degraded());
        assert!(assembled[1].is_degraded());
        assert!(assembled[2].is_degraded());
    }

    #[test]
    fn resume_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let runner = make_runner(2);
        let data = raw(3);

        let first = ScriptedGenerator::answering(oncology_payload());
        run_full_batch(&store, &data, &runner, &first, &SamplingConfig::default(), None).unwrap();
        let after_first = store.load();
        let backups_after_first = list_backups(store.backup_dir()).unwrap().len();

        let second = ScriptedGenerator::answering(oncology_payload());
        let summary = run_full_batch(&store, &data, &runner, &second, &SamplingConfig::default(), None).unwrap();

        assert_eq!(second.calls.get(), 0);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.checkpoint_records, 3);
        assert_eq!(store.load(), after_first);
        assert_eq!(list_backups(store.backup_dir()).unwrap().len(), backups_after_first);
    }

    #[test]
    fn resume_processes_only_new_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let runner = make_runner(40);
        let data = raw(3);

        let first = ScriptedGenerator::answering(oncology_payload());
        run_full_batch(&store, &data[..1], &runner, &first, &SamplingConfig::default(), None).unwrap();

        let second = ScriptedGenerator::answering(oncology_payload());
        let summary = run_full_batch(&store, &data, &runner, &second, &SamplingConfig::default(), None).unwrap();

        assert_eq!(summary.backlog, 2);
        let prompts = second.prompts.borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| !p.contains("Note 1:")));
        let keys: Vec<String> = store.load().into_iter().map(|r| r.unique_key).collect();
        assert_eq!(keys, vec!["p1_1_a1", "p2_1_a2", "p3_1_a3"]);
    }

    #[test]
    fn persists_after_every_batch_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let generator = ScriptedGenerator::answering(oncology_payload());
        let events = RefCell::new(Vec::new());
        let record_event = |e: BatchStatusEvent| events.borrow_mut().push(e);

        let summary = run_full_batch(
            &store,
            &raw(5),
            &make_runner(2),
            &generator,
            &SamplingConfig::default(),
            Some(&record_event),
        )
        .unwrap();

        assert_eq!(summary.batches, 3);
        assert_eq!(generator.calls.get(), 3);
        // The first save has nothing to back up.
        assert_eq!(list_backups(store.backup_dir()).unwrap().len(), 2);

        let events = events.into_inner();
        assert!(matches!(events.first(), Some(BatchStatusEvent::Started { backlog: 5, total_batches: 3, .. })));
        assert!(matches!(events.last(), Some(BatchStatusEvent::Completed { processed: 5, .. })));
        let persisted = events
            .iter()
            .filter(|e| matches!(e, BatchStatusEvent::BatchPersisted { .. }))
            .count();
        assert_eq!(persisted, 3);
    }

    #[test]
    fn persistence_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = CheckpointStore::new(blocker.join("checkpoint.csv"), dir.path().join("backups"));
        let generator = ScriptedGenerator::answering(oncology_payload());

        let result = run_full_batch(&store, &raw(2), &make_runner(40), &generator, &SamplingConfig::default(), None);

        assert!(matches!(result, Err(ExtractionError::Checkpoint(_))));
    }

    #[test]
    fn unready_generator_is_not_consulted_for_empty_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let runner = make_runner(40);
        let data = raw(2);
        let first = ScriptedGenerator::answering(oncology_payload());
        run_full_batch(&store, &data, &runner, &first, &SamplingConfig::default(), None).unwrap();

        let unavailable = UnavailableGenerator(ScriptedGenerator::answering(oncology_payload()));
        let summary = run_full_batch(&store, &data, &runner, &unavailable, &SamplingConfig::default(), None)
            .unwrap();

        assert_eq!(summary.state, RunState::Done);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.summary.record_count, 2);
    }

    #[test]
    fn unready_generator_stops_run_before_any_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let unavailable = UnavailableGenerator(ScriptedGenerator::answering(oncology_payload()));

        let result = run_full_batch(&store, &raw(2), &make_runner(40), &unavailable, &SamplingConfig::default(), None);

        assert!(matches!(
            result,
            Err(ExtractionError::Generation(GenerationError::NoModelAvailable(_)))
        ));
        assert_eq!(unavailable.0.calls.get(), 0);
        assert!(!store.path().exists());
    }

    #[test]
    fn batch_error_survives_failed_progress_save() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = CheckpointStore::new(blocker.join("checkpoint.csv"), dir.path().join("backups"));

        let error = save_after_failure(&store, &[], ExtractionError::Merge("no extraction for key p1".into()));

        assert!(matches!(error, ExtractionError::Merge(ref m) if m.contains("p1")));
        assert!(!store.path().exists());
    }

    #[test]
    fn batch_error_is_returned_after_progress_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let error = save_after_failure(&store, &[], ExtractionError::Merge("duplicate extraction".into()));

        assert!(matches!(error, ExtractionError::Merge(_)));
        assert!(store.path().exists());
    }

    #[test]
    fn merge_rejects_unknown_key() {
        let runner = make_runner(40);
        let records = raw(1);
        let batch: Vec<&RawRecord> = records.iter().collect();
        let stray = vec![Extraction::degraded("someone_else", "x")];

        assert!(matches!(runner.merge(&batch, stray), Err(ExtractionError::Merge(_))));
    }

    #[test]
    fn merge_rejects_missing_extraction() {
        let runner = make_runner(40);
        let records = raw(2);
        let batch: Vec<&RawRecord> = records.iter().collect();
        let partial = vec![Extraction::degraded("p1_1_a1", "x")];

        assert!(matches!(runner.merge(&batch, partial), Err(ExtractionError::Merge(_))));
    }

    #[test]
    fn backlog_skips_checkpointed_and_duplicate_keys() {
        let mut data = raw(3);
        data.push(data[1].clone());
        let runner = make_runner(40);
        let done: Vec<Record> = data[..1]
            .iter()
            .map(|r| {
                Record::assemble(r, Extraction::degraded(&r.unique_key, "x"), &runner.normalizer, &runner.regimen_mapper)
            })
            .collect();

        let backlog = compute_backlog(&data, &done);

        let keys: Vec<&str> = backlog.iter().map(|r| r.unique_key.as_str()).collect();
        assert_eq!(keys, vec!["p2_1_a2", "p3_1_a3"]);
    }

    #[test]
    fn empty_dataset_completes_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let generator = ScriptedGenerator::failing();

        let summary = run_full_batch(&store, &[], &make_runner(40), &generator, &SamplingConfig::default(), None)
            .unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.summary.record_count, 0);
        assert!(!store.path().exists());
    }
}
