//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::DATABASE_FILE_NAME;
use crate::database::Store;
use crate::error::Result;
use crate::services::{AutoBackupSettings, Backend, SettingsService};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub store: Store,
    pub backend: Backend,
    pub settings: SettingsService,
}

impl AppState {
    /// Stop scheduled backups
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down");
        self.backend.backup_scheduler().shutdown().await
    }
}

/// Application setup - called once on startup
pub async fn setup(app_data_dir: PathBuf) -> Result<AppState> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", app_data_dir);

    // Create necessary directories
    tokio::fs::create_dir_all(&app_data_dir).await?;

    let settings = SettingsService::new(app_data_dir.clone());
    let auto_backup = match settings.load().await {
        Ok(s) => s.auto_backup,
        Err(e) => {
            tracing::warn!("Could not load settings, using defaults: {}", e);
            AutoBackupSettings::default()
        }
    };
    let auto_backup = match auto_backup.validate() {
        Ok(()) => auto_backup,
        Err(e) => {
            tracing::warn!("Invalid auto-backup settings, using defaults: {}", e);
            AutoBackupSettings::default()
        }
    };

    let store = Store::open(&app_data_dir.join(DATABASE_FILE_NAME)).await?;
    let backend = Backend::init(store.clone(), auto_backup.to_config()).await?;

    if auto_backup.enabled {
        backend
            .setup_backup(auto_backup.resolve_directory(&app_data_dir))
            .await;
    } else {
        tracing::info!("Automatic backups disabled");
    }

    tracing::info!("Application initialized successfully");

    Ok(AppState {
        app_data_dir,
        store,
        backend,
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_setup_creates_database_and_settings() {
        init_tracing();
        let temp = TempDir::new().unwrap();

        let state = setup(temp.path().join("data")).await.unwrap();

        assert!(temp.path().join("data").join(DATABASE_FILE_NAME).exists());
        assert!(temp.path().join("data").join("settings.json").exists());
        assert_eq!(state.backend.fetch_tags().await.unwrap().len(), 1);

        state.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_settings_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("data");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();
        tokio::fs::write(
            data_dir.join("settings.json"),
            r#"{"auto_backup":{"max_backups":0,"interval_minutes":0}}"#,
        )
        .await
        .unwrap();

        let state = setup(data_dir).await.unwrap();
        let scheduler = state.backend.backup_scheduler();
        assert_eq!(scheduler.config(), &AutoBackupSettings::default().to_config());

        state
            .backend
            .create_tag(crate::database::Tag::new("t", "T"))
            .await
            .unwrap();
        let written = scheduler.tick().await.unwrap().unwrap();
        assert!(written.exists());

        state.shutdown().await.unwrap();
    }
}
