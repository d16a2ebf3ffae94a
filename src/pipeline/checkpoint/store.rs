//! Checkpoint file load/save.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::backup::{create_backup, prune_backups, MAX_BACKUPS};
use super::row::{CheckpointRow, CHECKPOINT_COLUMNS, REQUIRED_COLUMNS};
use super::CheckpointError;
use crate::models::Record;

/// A checkpoint file plus its backup directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    backup_dir: PathBuf,
    max_backups: usize,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
            max_backups: MAX_BACKUPS,
        }
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Where an unreadable checkpoint is moved: `<checkpoint>.corrupted`.
    pub fn quarantine_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".corrupted");
        PathBuf::from(name)
    }

    /// `quarantine_path`, or `<checkpoint>.corrupted.N` with the first free
    /// `N` when an earlier quarantine is still there.
    fn free_quarantine_path(&self) -> PathBuf {
        let base = self.quarantine_path();
        if !base.exists() {
            return base;
        }
        (1u32..)
            .map(|n| {
                let mut name = OsString::from(base.as_os_str());
                name.push(format!(".{n}"));
                PathBuf::from(name)
            })
            .find(|candidate| !candidate.exists())
            .unwrap_or(base)
    }

    /// Load all records. A missing file is an empty checkpoint. A file that
    /// cannot be parsed is backed up, moved aside and treated as empty.
    pub fn load(&self) -> Vec<Record> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No checkpoint found, starting fresh");
            return Vec::new();
        }

        match read_records(&self.path) {
            Ok(records) => {
                tracing::info!(
                    path = %self.path.display(),
                    records = records.len(),
                    "Loaded checkpoint"
                );
                records
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Checkpoint is corrupted, quarantining and starting fresh"
                );
                self.quarantine();
                Vec::new()
            }
        }
    }

    fn quarantine(&self) {
        if let Err(e) = create_backup(&self.path, &self.backup_dir) {
            tracing::error!(error = %e, "Failed to back up corrupted checkpoint");
        }
        let target = self.free_quarantine_path();
        match fs::rename(&self.path, &target) {
            Ok(()) => {
                tracing::warn!(quarantined = %target.display(), "Moved corrupted checkpoint aside");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to move corrupted checkpoint aside");
            }
        }
    }

    /// Atomically replace the checkpoint with `records`.
    ///
    /// The previous file is backed up first, and backups beyond the retention
    /// limit are pruned after the write succeeds.
    pub fn save(&self, records: &[Record]) -> Result<(), CheckpointError> {
        self.save_inner(records).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to save checkpoint");
            e
        })
    }

    fn save_inner(&self, records: &[Record]) -> Result<(), CheckpointError> {
        if self.path.exists() {
            create_backup(&self.path, &self.backup_dir)?;
        }
        write_atomic(&self.path, records)?;
        let pruned = prune_backups(&self.backup_dir, self.max_backups)?;
        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            pruned_backups = pruned,
            "Checkpoint saved"
        );
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<Record>, CheckpointError> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);

    let headers = reader.headers()?.clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(CheckpointError::MissingColumn(required.to_string()));
        }
    }

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (i, row) in reader.deserialize::<CheckpointRow>().enumerate() {
        let row = row?;
        if row.unique_key.trim().is_empty() {
            return Err(CheckpointError::EmptyKey { row: i + 1 });
        }
        if !seen.insert(row.unique_key.clone()) {
            tracing::warn!(unique_key = %row.unique_key, "Duplicate key in checkpoint, keeping first");
            continue;
        }
        records.push(row.into_record());
    }
    Ok(records)
}

fn write_atomic(path: &Path, records: &[Record]) -> Result<(), CheckpointError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    {
        // Header written by hand so an empty checkpoint still has one.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut tmp);
        writer.write_record(CHECKPOINT_COLUMNS)?;
        for record in records {
            writer.serialize(CheckpointRow::from(record))?;
        }
        writer.flush()?;
    }
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| CheckpointError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}
