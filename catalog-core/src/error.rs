//! Error types for the catalogue data layer
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the frontend.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Duplicate key in {collection}: {id}")]
    DuplicateKey { collection: &'static str, id: String },

    #[error("Not found in {collection}: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Invalid tag tree: {0}")]
    InvalidTagTree(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Map a failed insert to `DuplicateKey` when SQLite reports a unique violation
    pub(crate) fn on_insert(err: sqlx::Error, collection: &'static str, id: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateKey {
                    collection,
                    id: id.to_string(),
                }
            }
            _ => AppError::Database(err),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_to_message() {
        let err = AppError::NotFound {
            collection: "files",
            id: "abc".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Not found in files: abc\"");
    }
}
