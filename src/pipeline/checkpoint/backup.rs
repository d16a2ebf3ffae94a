//! Timestamped checkpoint backups with bounded retention.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::CheckpointError;

pub const BACKUP_PREFIX: &str = "checkpoint_backup_";
const BACKUP_EXTENSION: &str = "csv";

/// Backups kept after pruning.
pub const MAX_BACKUPS: usize = 5;

/// `checkpoint_backup_YYYYmmdd_HHMMSS_micros.csv`
pub fn backup_file_name(at: NaiveDateTime) -> String {
    format!(
        "{BACKUP_PREFIX}{}.{BACKUP_EXTENSION}",
        at.format("%Y%m%d_%H%M%S_%6f")
    )
}

/// Copy `source` into `backup_dir` under a fresh timestamped name.
///
/// Two backups within the same microsecond get a `-N` suffix so neither
/// overwrites the other.
pub fn create_backup(source: &Path, backup_dir: &Path) -> Result<PathBuf, CheckpointError> {
    fs::create_dir_all(backup_dir)?;

    let name = backup_file_name(chrono::Local::now().naive_local());
    let mut target = backup_dir.join(&name);
    let stem = name.trim_end_matches(&format!(".{BACKUP_EXTENSION}")).to_string();
    let mut n = 1;
    while target.exists() {
        target = backup_dir.join(format!("{stem}-{n}.{BACKUP_EXTENSION}"));
        n += 1;
    }

    fs::copy(source, &target)?;
    tracing::debug!(backup = %target.display(), "Created checkpoint backup");
    Ok(target)
}

fn is_backup(path: &Path) -> bool {
    path.is_file()
        && path.extension().and_then(|e| e.to_str()) == Some(BACKUP_EXTENSION)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(BACKUP_PREFIX))
}

/// Backups in `backup_dir`, oldest first. A missing directory has none.
pub fn list_backups(backup_dir: &Path) -> Result<Vec<PathBuf>, CheckpointError> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups = Vec::new();
    for entry in fs::read_dir(backup_dir)? {
        let path = entry?.path();
        if is_backup(&path) {
            backups.push(path);
        }
    }
    // Names embed the timestamp, so stem order is age order.
    backups.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));
    Ok(backups)
}

/// Delete the oldest backups until at most `keep` remain. Returns the number
/// removed.
pub fn prune_backups(backup_dir: &Path, keep: usize) -> Result<usize, CheckpointError> {
    let backups = list_backups(backup_dir)?;
    let excess = backups.len().saturating_sub(keep);
    for old in &backups[..excess] {
        fs::remove_file(old)?;
        tracing::debug!(backup = %old.display(), "Removed old checkpoint backup");
    }
    Ok(excess)
}
