//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use super::scheduler::BackupConfig;
use crate::config::{
    BACKUP_DIR_ENV, DEFAULT_BACKUP_INTERVAL, DEFAULT_MAX_BACKUPS, MAX_RETAINED_BACKUPS,
    MIN_BACKUP_INTERVAL_MINUTES,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Auto-backup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoBackupSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Custom backup location (if None, uses app_data_dir/backups)
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// Indented snapshots are larger but diff cleanly
    #[serde(default = "default_true")]
    pub pretty_json: bool,
}

fn default_true() -> bool {
    true
}

fn default_interval_minutes() -> u64 {
    DEFAULT_BACKUP_INTERVAL.as_secs() / 60
}

fn default_max_backups() -> usize {
    DEFAULT_MAX_BACKUPS
}

impl Default for AutoBackupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            interval_minutes: default_interval_minutes(),
            max_backups: default_max_backups(),
            pretty_json: true,
        }
    }
}

impl AutoBackupSettings {
    pub fn validate(&self) -> Result<()> {
        if self.interval_minutes < MIN_BACKUP_INTERVAL_MINUTES {
            return Err(AppError::Generic(format!(
                "Backup interval must be at least {} minute(s)",
                MIN_BACKUP_INTERVAL_MINUTES
            )));
        }
        if self.max_backups == 0 || self.max_backups > MAX_RETAINED_BACKUPS {
            return Err(AppError::Generic(format!(
                "Number of kept backups must be between 1 and {}",
                MAX_RETAINED_BACKUPS
            )));
        }
        Ok(())
    }

    pub fn to_config(&self) -> BackupConfig {
        BackupConfig {
            interval: Duration::from_secs(self.interval_minutes * 60),
            max_backups: self.max_backups,
            pretty_json: self.pretty_json,
        }
    }

    /// Backup directory: the environment override, then the configured
    /// directory, then `backups` inside the app data directory
    pub fn resolve_directory(&self, app_data_dir: &Path) -> PathBuf {
        if let Some(dir) = std::env::var_os(BACKUP_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        match &self.directory {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => app_data_dir.join("backups"),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub auto_backup: AutoBackupSettings,
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join("settings.json"),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Get auto-backup settings
    pub async fn get_auto_backup(&self) -> Result<AutoBackupSettings> {
        let settings = self.load().await?;
        Ok(settings.auto_backup)
    }

    /// Update auto-backup settings. Takes effect on next start.
    pub async fn update_auto_backup(&self, auto_backup: AutoBackupSettings) -> Result<()> {
        auto_backup.validate()?;
        let mut settings = self.load().await?;
        settings.auto_backup = auto_backup;
        self.save(&settings).await?;
        Ok(())
    }
}
