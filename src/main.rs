use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use drug_extraction_lib::config::{self, PipelineSettings};

/// Extract drugs and regimens from clinical notes and score them against
/// ground truth. Resumes from the checkpoint on every run.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (JSON). Defaults to ~/.drug-extraction/settings.json
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Raw dataset CSV
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Checkpoint CSV
    #[arg(short, long)]
    checkpoint: Option<PathBuf>,

    /// Records per generation batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Ollama model name
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long)]
    ollama_url: Option<String>,

    /// Print metrics for the existing checkpoint and exit
    #[arg(long)]
    report_only: bool,

    /// Print the run summary as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_overrides(&self, settings: &mut PipelineSettings) {
        if let Some(data) = &self.data {
            settings.data_file = data.clone();
        }
        if let Some(checkpoint) = &self.checkpoint {
            settings.checkpoint_file = checkpoint.clone();
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(model) = &self.model {
            settings.model_name = model.clone();
        }
        if let Some(url) = &self.ollama_url {
            settings.ollama_url = url.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    drug_extraction_lib::init_tracing(args.verbose);

    let mut settings = match args.settings.clone().or_else(config::default_settings_path) {
        Some(path) => PipelineSettings::load(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => PipelineSettings::default(),
    };
    args.apply_overrides(&mut settings);

    if args.report_only {
        let summary = drug_extraction_lib::report(&settings);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print!("{}", summary.render());
        }
        return Ok(());
    }

    let run = drug_extraction_lib::run(&settings).context("Extraction run failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!(
            "Run {} ({}) finished: {} new records ({} degraded) in {} batches, {:.2}s",
            run.run_id,
            run.model_name,
            run.processed,
            run.degraded,
            run.batches,
            run.duration_ms as f64 / 1000.0
        );
        print!("{}", run.summary.render());
    }
    Ok(())
}
