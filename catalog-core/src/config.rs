//! Application configuration constants
//!
//! Central location for collection names, reserved identifiers,
//! backup defaults and file naming used throughout the data layer.

use std::time::Duration;

// ===== Store =====

/// File name of the SQLite database inside the app data directory
pub const DATABASE_FILE_NAME: &str = "catalog.sqlite";

/// Logical database name written into snapshot metadata
pub const DATABASE_NAME: &str = "Catalog";

/// Schema version written into snapshot metadata
pub const DATABASE_VERSION: i32 = 1;

/// Collection holding image files
pub const FILES_COLLECTION: &str = "files";
/// Collection holding the tag tree
pub const TAGS_COLLECTION: &str = "tags";
/// Collection holding watched locations
pub const LOCATIONS_COLLECTION: &str = "locations";
/// Collection holding saved searches
pub const SEARCHES_COLLECTION: &str = "searches";

/// Every document collection, in the order they are exported
pub const COLLECTIONS: &[&str] = &[
    FILES_COLLECTION,
    TAGS_COLLECTION,
    LOCATIONS_COLLECTION,
    SEARCHES_COLLECTION,
];

// ===== Tags =====

/// Reserved ID of the root of the tag tree
pub const ROOT_TAG_ID: &str = "root";

/// Name given to the root tag when it is seeded
pub const ROOT_TAG_NAME: &str = "Root";

// ===== Files =====

/// Image extensions recognised by the catalogue. The first entry is the
/// default value of a new extension criterion.
pub const IMG_EXTENSIONS: &[&str] = &[
    "gif", "png", "apng", "jpg", "jpeg", "jfif", "webp", "tif", "tiff", "bmp", "svg", "ico",
    "psd", "kra", "exr",
];

// ===== Snapshots =====

/// Format identifier stored in every snapshot
pub const SNAPSHOT_FORMAT_NAME: &str = "catalog-export";

/// Snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ===== Auto-Backup =====

/// Default interval between scheduled backup checks
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Default number of automatic backups kept on disk
pub const DEFAULT_MAX_BACKUPS: usize = 6;

/// Prefix of automatic backup file names
pub const AUTO_BACKUP_PREFIX: &str = "auto_backup_";

/// Timestamp embedded in automatic backup file names (UTC)
pub const AUTO_BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S%.3f";

/// Timestamp embedded in manual backup file names (local time)
pub const MANUAL_BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Environment variable overriding the backup directory
pub const BACKUP_DIR_ENV: &str = "CATALOG_BACKUP_DIR";

/// Minimum interval accepted from settings (1 minute)
pub const MIN_BACKUP_INTERVAL_MINUTES: u64 = 1;

/// Maximum retained backups accepted from settings
pub const MAX_RETAINED_BACKUPS: usize = 100;
