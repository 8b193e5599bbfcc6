//! Store snapshots
//!
//! A snapshot is one JSON document holding every collection. Table
//! metadata (names and row counts) comes before the rows so a reader can
//! report what a file contains without keeping the rows in memory.

use super::models::{Entity, File, Location, SavedSearch, Tag};
use crate::config::{
    COLLECTIONS, FILES_COLLECTION, LOCATIONS_COLLECTION, SEARCHES_COLLECTION,
    SNAPSHOT_FORMAT_NAME, SNAPSHOT_FORMAT_VERSION, TAGS_COLLECTION,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub format_name: String,
    pub format_version: u32,
    pub data: SnapshotData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub database_name: String,
    pub database_version: i32,
    pub tables: Vec<TableInfo>,
    pub data: Vec<TableRows>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRows {
    pub table_name: String,
    pub rows: Vec<serde_json::Value>,
}

/// Header-only view used by `peek`; row data is skipped by the parser
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotHeader {
    format_name: String,
    data: HeaderData,
}

#[derive(Deserialize)]
struct HeaderData {
    tables: Vec<TableInfo>,
}

/// Row counts of the tag and file collections in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub num_tags: usize,
    pub num_files: usize,
}

impl Snapshot {
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Parse and fully validate a snapshot before anything is imported
    pub fn parse(contents: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(contents)
            .map_err(|e| AppError::InvalidBackup(format!("Malformed snapshot: {}", e)))?;

        if snapshot.format_name != SNAPSHOT_FORMAT_NAME {
            return Err(AppError::InvalidBackup(format!(
                "Unknown snapshot format: {}",
                snapshot.format_name
            )));
        }
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(AppError::InvalidBackup(format!(
                "Snapshot format version {} is newer than supported version {}",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        for collection in COLLECTIONS {
            let info = snapshot
                .data
                .tables
                .iter()
                .find(|t| t.name == *collection)
                .ok_or_else(|| {
                    AppError::InvalidBackup(format!("Missing table metadata for {}", collection))
                })?;

            let rows = snapshot.rows(collection).ok_or_else(|| {
                AppError::InvalidBackup(format!("Missing rows for {}", collection))
            })?;

            if rows.len() != info.row_count {
                return Err(AppError::InvalidBackup(format!(
                    "Table {} declares {} rows but contains {}",
                    collection,
                    info.row_count,
                    rows.len()
                )));
            }
        }

        validate_rows::<File>(snapshot.rows(FILES_COLLECTION).unwrap_or_default())?;
        validate_rows::<Tag>(snapshot.rows(TAGS_COLLECTION).unwrap_or_default())?;
        validate_rows::<Location>(snapshot.rows(LOCATIONS_COLLECTION).unwrap_or_default())?;
        validate_rows::<SavedSearch>(snapshot.rows(SEARCHES_COLLECTION).unwrap_or_default())?;

        Ok(snapshot)
    }

    /// Rows of one collection, if the snapshot has them
    pub fn rows(&self, table: &str) -> Option<&[serde_json::Value]> {
        self.data
            .data
            .iter()
            .find(|t| t.table_name == table)
            .map(|t| t.rows.as_slice())
    }
}

/// Read the tag and file counts from a snapshot's metadata
pub fn peek(contents: &str) -> Result<SnapshotSummary> {
    let header: SnapshotHeader = serde_json::from_str(contents)
        .map_err(|e| AppError::InvalidBackup(format!("Malformed snapshot: {}", e)))?;

    if header.format_name != SNAPSHOT_FORMAT_NAME {
        return Err(AppError::InvalidBackup(format!(
            "Unknown snapshot format: {}",
            header.format_name
        )));
    }

    let count = |name: &str| {
        header
            .data
            .tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.row_count)
    };

    match (count(TAGS_COLLECTION), count(FILES_COLLECTION)) {
        (Some(num_tags), Some(num_files)) => Ok(SnapshotSummary {
            num_tags,
            num_files,
        }),
        _ => Err(AppError::InvalidBackup(
            "Database does not contain a table for files and/or tags".to_string(),
        )),
    }
}

fn validate_rows<E: Entity>(rows: &[serde_json::Value]) -> Result<()> {
    let mut ids = HashSet::with_capacity(rows.len());
    for row in rows {
        let entity: E = serde_json::from_value(row.clone()).map_err(|e| {
            AppError::InvalidBackup(format!("Invalid row in {}: {}", E::COLLECTION, e))
        })?;
        if !ids.insert(entity.id().to_string()) {
            return Err(AppError::InvalidBackup(format!(
                "Duplicate id {} in {}",
                entity.id(),
                E::COLLECTION
            )));
        }
    }
    Ok(())
}
