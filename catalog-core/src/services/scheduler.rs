//! Backup scheduler
//!
//! Takes automatic backups of the store on a fixed interval, but only
//! when something changed since the last one. Mutations call
//! `notify_change`, which only flips a flag; all I/O happens on the
//! scheduled job.

use super::backup::{auto_backup_file_name, prune_auto_backups, write_snapshot};
use crate::config::{DEFAULT_BACKUP_INTERVAL, DEFAULT_MAX_BACKUPS};
use crate::database::{timestamp_now, Store};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Timing and retention of automatic backups
#[derive(Debug, Clone, PartialEq)]
pub struct BackupConfig {
    pub interval: Duration,
    pub max_backups: usize,
    pub pretty_json: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_BACKUP_INTERVAL,
            max_backups: DEFAULT_MAX_BACKUPS,
            pretty_json: true,
        }
    }
}

/// Scheduler service for automatic backups
pub struct BackupScheduler {
    store: Store,
    config: BackupConfig,
    has_changes: AtomicBool,
    /// Unix milliseconds of the last successful backup, 0 if none
    last_backup_ms: AtomicI64,
    directory: OnceLock<PathBuf>,
    scheduler: Mutex<Option<JobScheduler>>,
}

impl BackupScheduler {
    pub fn new(store: Store, config: BackupConfig) -> Self {
        Self {
            store,
            config,
            has_changes: AtomicBool::new(false),
            last_backup_ms: AtomicI64::new(0),
            directory: OnceLock::new(),
            scheduler: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Directory backups are written to, once initialized
    pub fn directory(&self) -> Option<&Path> {
        self.directory.get().map(PathBuf::as_path)
    }

    pub fn has_pending_changes(&self) -> bool {
        self.has_changes.load(Ordering::Acquire)
    }

    pub fn last_backup_time(&self) -> Option<DateTime<Utc>> {
        match self.last_backup_ms.load(Ordering::Acquire) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// Record that the store changed. Never blocks and never does I/O.
    pub fn notify_change(&self) {
        self.has_changes.store(true, Ordering::Release);
    }

    /// Create the backup directory and start the repeating backup job.
    ///
    /// On error nothing is scheduled; the rest of the store keeps working.
    pub async fn initialize(self: &Arc<Self>, directory: PathBuf) -> Result<()> {
        fs::create_dir_all(&directory).await?;
        if !fs::metadata(&directory).await?.is_dir() {
            return Err(AppError::Backup(format!(
                "Backup location is not a directory: {:?}",
                directory
            )));
        }

        let mut running = self.scheduler.lock().await;
        if running.is_some() || self.directory.get().is_some() {
            return Err(AppError::Backup("Backup scheduler already initialized".to_string()));
        }
        if self.config.interval.is_zero() {
            return Err(AppError::Scheduler("Backup interval must not be zero".to_string()));
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        let this: Weak<Self> = Arc::downgrade(self);
        let job = Job::new_repeated_async(self.config.interval, move |_uuid, _l| {
            let this = this.clone();
            Box::pin(async move {
                if let Some(this) = this.upgrade() {
                    this.run_scheduled().await;
                }
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create backup job: {}", e)))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to schedule job: {}", e)))?;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;

        // Only set once the job runs, under the lock checked above
        let _ = self.directory.set(directory.clone());
        *running = Some(scheduler);

        tracing::info!(
            "Backup scheduler started: every {:?} into {:?}, keeping {}",
            self.config.interval,
            directory,
            self.config.max_backups
        );
        Ok(())
    }

    /// Take a backup if anything changed since the last one.
    ///
    /// Returns the path written, or `None` when there was nothing to do
    /// or the scheduler has no directory yet. A failed write keeps the
    /// change flag set so the next tick retries.
    pub async fn tick(&self) -> Result<Option<PathBuf>> {
        let Some(directory) = self.directory.get() else {
            return Ok(None);
        };

        if !self.has_changes.swap(false, Ordering::AcqRel) {
            return Ok(None);
        }

        match self.create_backup(directory).await {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                self.has_changes.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    async fn run_scheduled(&self) {
        match self.tick().await {
            Ok(Some(path)) => tracing::info!("Automatic backup created: {:?}", path),
            Ok(None) => tracing::debug!("No changes since last backup"),
            Err(e) => tracing::error!("Automatic backup failed: {}", e),
        }
    }

    async fn create_backup(&self, directory: &Path) -> Result<PathBuf> {
        let now = timestamp_now();
        let path = directory.join(auto_backup_file_name(now));

        write_snapshot(&self.store, &path, self.config.pretty_json).await?;
        self.last_backup_ms
            .store(now.timestamp_millis(), Ordering::Release);

        // Rotation failure does not fail the backup
        if let Err(e) = prune_auto_backups(directory, self.config.max_backups).await {
            tracing::warn!("Failed to rotate backups in {:?}: {}", directory, e);
        }

        Ok(path)
    }

    /// Stop the repeating job
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| AppError::Scheduler(format!("Failed to shutdown scheduler: {}", e)))?;
            tracing::info!("Backup scheduler shutdown");
        }
        Ok(())
    }
}
