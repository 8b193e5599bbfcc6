//! Database module
//!
//! This module provides all database functionality including:
//! - Schema and migrations
//! - Entity models and search criteria
//! - Generic repository over document collections
//! - Whole-store snapshots

pub mod criteria;
pub mod models;
pub mod query;
pub mod repository;
pub mod schema;
pub mod snapshot;
pub mod tag_tree;

pub use criteria::{
    BinaryOperator, Condition, Criteria, DateKey, NumberKey, NumberOperator, OperatorType,
    SearchKey, StringOperator, TagOperator, TextKey, Value,
};
pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;
pub use snapshot::{Snapshot, SnapshotSummary};
pub use tag_tree::TagTree;

use crate::config::{
    COLLECTIONS, DATABASE_NAME, DATABASE_VERSION, SNAPSHOT_FORMAT_NAME, SNAPSHOT_FORMAT_VERSION,
};
use crate::error::Result;
use snapshot::{SnapshotData, TableInfo, TableRows};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection
/// sees the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}

/// Handle to the embedded document store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the store at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = create_pool(db_path).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory store.
    ///
    /// The pool keeps a single connection alive for its whole lifetime,
    /// since the database disappears with its last connection.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        initialize_database(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.pool.clone())
    }

    /// Destroy every collection and recreate the empty schema
    pub async fn clear(&self) -> Result<()> {
        tracing::info!("Clearing database");
        schema::drop_database(&self.pool).await?;
        initialize_database(&self.pool).await?;
        Ok(())
    }

    /// Read every collection into a snapshot
    pub async fn export_snapshot(&self) -> Result<Snapshot> {
        let mut tables = Vec::with_capacity(COLLECTIONS.len());
        let mut data = Vec::with_capacity(COLLECTIONS.len());

        for collection in COLLECTIONS {
            let docs: Vec<String> =
                sqlx::query_scalar(&format!("SELECT doc FROM {} ORDER BY seq ASC", collection))
                    .fetch_all(&self.pool)
                    .await?;

            let rows = docs
                .iter()
                .map(|doc| serde_json::from_str(doc))
                .collect::<std::result::Result<Vec<serde_json::Value>, _>>()?;

            tables.push(TableInfo {
                name: collection.to_string(),
                row_count: rows.len(),
            });
            data.push(TableRows {
                table_name: collection.to_string(),
                rows,
            });
        }

        Ok(Snapshot {
            format_name: SNAPSHOT_FORMAT_NAME.to_string(),
            format_version: SNAPSHOT_FORMAT_VERSION,
            data: SnapshotData {
                database_name: DATABASE_NAME.to_string(),
                database_version: DATABASE_VERSION,
                tables,
                data,
            },
        })
    }

    /// Replace the contents of every collection with a validated snapshot.
    ///
    /// Runs in one transaction: if any row fails to insert, the store
    /// keeps its previous contents.
    pub async fn import_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for collection in COLLECTIONS {
            sqlx::query(&format!("DELETE FROM {}", collection))
                .execute(&mut *tx)
                .await?;

            let insert = format!("INSERT INTO {} (id, doc) VALUES (?, ?)", collection);
            for row in snapshot.rows(collection).unwrap_or_default() {
                let id = row
                    .get("id")
                    .and_then(|id| id.as_str())
                    .ok_or_else(|| {
                        crate::error::AppError::InvalidBackup(format!(
                            "Row without id in {}",
                            collection
                        ))
                    })?;

                sqlx::query(&insert)
                    .bind(id)
                    .bind(row.to_string())
                    .execute(&mut *tx)
                    .await?;
            }

            tracing::debug!(
                "Imported {} rows into {}",
                snapshot.rows(collection).map_or(0, |r| r.len()),
                collection
            );
        }

        tx.commit().await?;
        Ok(())
    }
}
