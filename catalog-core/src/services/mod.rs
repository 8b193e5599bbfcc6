//! Services module
//!
//! Business logic that coordinates the repositories: the catalogue
//! backend, snapshot files, scheduled backups and settings.

pub mod backend;
pub mod backup;
pub mod scheduler;
pub mod settings;

pub use backend::Backend;
pub use scheduler::{BackupConfig, BackupScheduler};
pub use settings::{AppSettings, AutoBackupSettings, SettingsService};
