//! Backup files
//!
//! Writes store snapshots to disk, reads them back for restore and
//! peeking, and manages the rotating set of automatic backups.
//! Automatic backups carry their creation time in the file name, so
//! rotation does not depend on filesystem timestamps.

use crate::config::{
    AUTO_BACKUP_PREFIX, AUTO_BACKUP_TIMESTAMP_FORMAT, MANUAL_BACKUP_TIMESTAMP_FORMAT,
};
use crate::database::snapshot::{self, Snapshot, SnapshotSummary};
use crate::database::Store;
use crate::error::Result;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Write a snapshot of the whole store to `path`, creating parent directories.
///
/// The file is written next to its destination and renamed into place,
/// so a crash never leaves a truncated backup behind.
pub async fn write_snapshot(store: &Store, path: &Path, pretty: bool) -> Result<u64> {
    let snapshot = store.export_snapshot().await?;
    let json = snapshot.to_json(pretty)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json.as_bytes()).await?;
    fs::rename(&temp_path, path).await?;

    tracing::debug!("Wrote snapshot to {:?} ({} bytes)", path, json.len());
    Ok(json.len() as u64)
}

/// Read and validate a snapshot file
pub async fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let contents = fs::read_to_string(path).await?;
    Snapshot::parse(&contents)
}

/// Read only the table counts of a snapshot file
pub async fn peek_snapshot(path: &Path) -> Result<SnapshotSummary> {
    let contents = fs::read_to_string(path).await?;
    snapshot::peek(&contents)
}

/// Path for a backup the user asked for explicitly
pub fn manual_backup_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "backup_{}.json",
        now.format(MANUAL_BACKUP_TIMESTAMP_FORMAT)
    ))
}

/// File name of an automatic backup taken at `time`
pub fn auto_backup_file_name(time: DateTime<Utc>) -> String {
    format!(
        "{}{}.json",
        AUTO_BACKUP_PREFIX,
        time.format(AUTO_BACKUP_TIMESTAMP_FORMAT)
    )
}

/// Creation time embedded in an automatic backup file name
pub fn parse_auto_backup_time(file_name: &str) -> Option<DateTime<Utc>> {
    let stamp = file_name
        .strip_prefix(AUTO_BACKUP_PREFIX)?
        .strip_suffix(".json")?;

    NaiveDateTime::parse_from_str(stamp, AUTO_BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Automatic backups in `dir`, newest first. Other files are ignored.
pub async fn list_auto_backups(dir: &Path) -> Result<Vec<(DateTime<Utc>, PathBuf)>> {
    let mut backups = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(time) = file_name.to_str().and_then(parse_auto_backup_time) else {
            continue;
        };
        if entry.file_type().await?.is_file() {
            backups.push((time, entry.path()));
        }
    }

    backups.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(backups)
}

/// Delete the oldest automatic backups so at most `keep` remain.
/// Returns how many files were removed.
pub async fn prune_auto_backups(dir: &Path, keep: usize) -> Result<usize> {
    let backups = list_auto_backups(dir).await?;
    let mut removed = 0;

    for (_, path) in backups.iter().skip(keep) {
        tracing::info!("Deleting old backup: {:?}", path);
        match fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to delete backup file {:?}: {}", path, e),
        }
    }

    Ok(removed)
}
