use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::batch_extraction::ExtractionConfig;
use crate::pipeline::generation::SamplingConfig;
use crate::pipeline::normalize::{DEFAULT_DRUG_THRESHOLD, DEFAULT_REGIMEN_THRESHOLD};

/// Application-level constants
pub const APP_NAME: &str = "drug-extraction";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "drug_extraction_lib=info,drug_extraction=info,warn"
}

/// Log filter for `--verbose` runs.
pub fn verbose_log_filter() -> &'static str {
    "drug_extraction_lib=debug,drug_extraction=debug,warn"
}

/// ~/.drug-extraction/ when a home directory is known.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(format!(".{APP_NAME}")))
}

/// ~/.drug-extraction/settings.json
pub fn default_settings_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("settings.json"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Everything a pipeline run needs. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub data_file: PathBuf,
    pub checkpoint_file: PathBuf,
    pub backup_dir: PathBuf,
    pub max_backups: usize,
    pub drug_synonym_file: PathBuf,
    pub regimen_drug_file: PathBuf,

    pub ollama_url: String,
    pub model_name: String,
    pub request_timeout_secs: u64,
    pub sampling: SamplingConfig,

    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_secs: u64,

    pub drug_match_threshold: u8,
    pub regimen_match_threshold: u8,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("sample_dummy_dataset.csv"),
            checkpoint_file: PathBuf::from("drug_extraction_checkpoint.csv"),
            backup_dir: PathBuf::from("checkpoint_backups"),
            max_backups: crate::pipeline::checkpoint::MAX_BACKUPS,
            drug_synonym_file: PathBuf::from("cleaned_hemonc_regimen_drug_synonym.csv"),
            regimen_drug_file: PathBuf::from("regimen_drug_data.csv"),
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.1:8b".to_string(),
            request_timeout_secs: 300,
            sampling: SamplingConfig::default(),
            batch_size: 40,
            max_retries: 3,
            retry_delay_secs: 5,
            drug_match_threshold: DEFAULT_DRUG_THRESHOLD,
            regimen_match_threshold: DEFAULT_REGIMEN_THRESHOLD,
        }
    }
}

impl PipelineSettings {
    /// Load settings from a JSON file, or defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        settings.validate()?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.max_backups == 0 {
            return Err(ConfigError::Invalid("max_backups must be at least 1".into()));
        }
        for (name, value) in [
            ("drug_match_threshold", self.drug_match_threshold),
            ("regimen_match_threshold", self.regimen_match_threshold),
        ] {
            if value > 100 {
                return Err(ConfigError::Invalid(format!("{name} must be between 0 and 100, got {value}")));
            }
        }
        Ok(())
    }

    pub fn extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig {
            model_name: self.model_name.clone(),
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        if let (Some(dir), Some(home)) = (app_data_dir(), dirs::home_dir()) {
            assert!(dir.starts_with(home));
            assert!(dir.ends_with(".drug-extraction"));
        }
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn defaults_are_valid() {
        let settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.batch_size, 40);
        assert_eq!(settings.drug_match_threshold, 85);
        assert_eq!(settings.regimen_match_threshold, 70);
        assert_eq!(settings.checkpoint_file, PathBuf::from("drug_extraction_checkpoint.csv"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, PipelineSettings::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"batch_size": 8, "sampling": {"seed": 7}}"#).unwrap();

        let settings = PipelineSettings::load(&path).unwrap();
        assert_eq!(settings.batch_size, 8);
        assert_eq!(settings.sampling.seed, Some(7));
        assert_eq!(settings.sampling.top_k, 200);
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineSettings::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"batch_size": 0}"#).unwrap();
        assert!(matches!(PipelineSettings::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn threshold_above_100_is_rejected() {
        let settings = PipelineSettings {
            drug_match_threshold: 101,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn extraction_config_carries_retry_settings() {
        let settings = PipelineSettings {
            retry_delay_secs: 2,
            max_retries: 4,
            ..Default::default()
        };
        let config = settings.extraction_config();
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.max_retries, 4);
    }
}
