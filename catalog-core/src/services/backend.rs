//! Catalogue backend
//!
//! The single entry point the UI talks to. Owns one repository per
//! collection and keeps references between collections consistent when
//! tags, files or locations are removed or merged.
//!
//! Cascades are a sequence of separately committed writes. Files are
//! always rewritten before the tags or locations they point at are
//! deleted: if a later step fails, what is left behind is an unused
//! tag or location record, never a file pointing at something missing.

use super::backup::{peek_snapshot, read_snapshot, write_snapshot};
use super::scheduler::{BackupConfig, BackupScheduler};
use crate::config::{ROOT_TAG_ID, ROOT_TAG_NAME};
use crate::database::{
    Condition, Criteria, File, FileField, Id, Location, LocationField, OrderDirection,
    Repository, SavedSearch, SearchField, SnapshotSummary, Store, Tag, TagTree, Value,
};
use crate::error::{AppError, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct Backend {
    store: Store,
    files: Repository<File>,
    tags: Repository<Tag>,
    locations: Repository<Location>,
    searches: Repository<SavedSearch>,
    backup: Arc<BackupScheduler>,
}

impl Backend {
    /// Build the repositories and seed the root tag if there are no tags
    pub async fn init(store: Store, backup_config: BackupConfig) -> Result<Self> {
        tracing::info!("Initializing backend");

        let backend = Self {
            files: store.repository(),
            tags: store.repository(),
            locations: store.repository(),
            searches: store.repository(),
            backup: Arc::new(BackupScheduler::new(store.clone(), backup_config)),
            store,
        };
        backend.seed_root_tag().await?;

        Ok(backend)
    }

    async fn seed_root_tag(&self) -> Result<()> {
        if self.tags.count().await? == 0 {
            tracing::info!("Creating root tag");
            self.tags.create(&Tag::new(ROOT_TAG_ID, ROOT_TAG_NAME)).await?;
        }
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn backup_scheduler(&self) -> &Arc<BackupScheduler> {
        &self.backup
    }

    /// Start automatic backups into `directory`.
    ///
    /// Returns whether the scheduler is running. Failure is logged and
    /// leaves the backend fully usable without automatic backups.
    pub async fn setup_backup(&self, directory: PathBuf) -> bool {
        match self.backup.initialize(directory).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Could not initialize backup scheduler: {}", e);
                false
            }
        }
    }

    // ===== Reads =====

    pub async fn fetch_tags(&self) -> Result<Vec<Tag>> {
        tracing::debug!("Fetching tags");
        self.tags.get_all().await
    }

    pub async fn fetch_files(&self, order: FileField, dir: OrderDirection) -> Result<Vec<File>> {
        tracing::debug!("Fetching files ordered by {:?} {:?}", order, dir);
        self.files.get_all_ordered(order, dir).await
    }

    /// Files for the given IDs in the same order; unknown IDs are skipped
    pub async fn fetch_files_by_id(&self, ids: &[Id]) -> Result<Vec<File>> {
        tracing::debug!("Fetching {} files by ID", ids.len());
        let files = self.files.get_by_ids(ids).await?;
        Ok(files.into_iter().flatten().collect())
    }

    pub async fn fetch_files_by_key(
        &self,
        key: FileField,
        value: impl Into<Value>,
    ) -> Result<Vec<File>> {
        let value = value.into();
        tracing::debug!("Fetching files by {:?} = {:?}", key, value);
        self.files.get_by_key(key, value).await
    }

    pub async fn fetch_locations(&self) -> Result<Vec<Location>> {
        tracing::debug!("Fetching locations");
        self.locations
            .get_all_ordered(LocationField::DateAdded, OrderDirection::Asc)
            .await
    }

    /// Saved searches in the user's manual order
    pub async fn fetch_searches(&self) -> Result<Vec<SavedSearch>> {
        tracing::debug!("Fetching searches");
        self.searches
            .get_all_ordered(SearchField::Position, OrderDirection::Asc)
            .await
    }

    /// Files matching all (or any) of the criteria. An empty list matches every file.
    pub async fn search_files(
        &self,
        criteria: &[Criteria],
        order: FileField,
        dir: OrderDirection,
        match_any: bool,
    ) -> Result<Vec<File>> {
        tracing::info!(
            "Searching files with {} criteria (match_any: {})",
            criteria.len(),
            match_any
        );
        self.files.find(criteria, order, dir, match_any).await
    }

    /// Total number of files and number of files without tags
    pub async fn count_files(&self) -> Result<(usize, usize)> {
        let untagged = Condition::Contains(FileField::Tags, Vec::new());
        let (total, untagged) = tokio::join!(self.files.count(), self.files.count_exact(&untagged));
        Ok((total?, untagged?))
    }

    // ===== Creates =====

    pub async fn create_tag(&self, tag: Tag) -> Result<()> {
        tracing::info!("Creating tag: {} ({})", tag.name, tag.id);
        self.check_tag_tree(&tag).await?;
        self.tags.create(&tag).await?;
        self.backup.notify_change();
        Ok(())
    }

    pub async fn create_file(&self, file: File) -> Result<()> {
        tracing::info!("Creating file: {}", file.absolute_path);
        self.files.create(&file).await?;
        self.backup.notify_change();
        Ok(())
    }

    pub async fn create_location(&self, location: Location) -> Result<()> {
        tracing::info!("Creating location: {}", location.path);
        self.locations.create(&location).await?;
        self.backup.notify_change();
        Ok(())
    }

    pub async fn create_search(&self, search: SavedSearch) -> Result<()> {
        tracing::info!("Creating search: {}", search.name);
        self.searches.create(&search).await?;
        self.backup.notify_change();
        Ok(())
    }

    /// Insert files found under `path`, skipping any whose absolute path
    /// is already known. Returns how many files were inserted.
    pub async fn create_files_from_path(&self, path: &str, files: Vec<File>) -> Result<usize> {
        tracing::info!("Creating {} files from {}", files.len(), path);

        let existing: HashSet<String> = self
            .files
            .find_exact(&Condition::StartsWith(FileField::AbsolutePath, path.to_string()))
            .await?
            .into_iter()
            .map(|f| f.absolute_path)
            .collect();

        let new_files: Vec<File> = files
            .into_iter()
            .filter(|f| !existing.contains(&f.absolute_path))
            .collect();

        tracing::debug!(
            "{} files already known under {}, inserting {}",
            existing.len(),
            path,
            new_files.len()
        );

        if new_files.is_empty() {
            return Ok(0);
        }

        self.files.create_many(&new_files).await?;
        self.backup.notify_change();
        Ok(new_files.len())
    }

    // ===== Updates =====

    /// Save a tag; rejects sub tags that are cyclic or already have a parent
    pub async fn save_tag(&self, tag: Tag) -> Result<()> {
        tracing::info!("Saving tag: {} ({})", tag.name, tag.id);
        self.check_tag_tree(&tag).await?;
        self.tags.update(&tag).await?;
        self.backup.notify_change();
        Ok(())
    }

    async fn check_tag_tree(&self, tag: &Tag) -> Result<()> {
        let tree = TagTree::new(self.tags.get_all().await?);
        tree.check_update(tag, ROOT_TAG_ID).map_err(|e| {
            AppError::InvalidTagTree(format!("Cannot store tag {}: {}", tag.id, e))
        })
    }

    pub async fn save_files(&self, files: Vec<File>) -> Result<()> {
        tracing::info!("Saving {} files", files.len());
        self.files.update_many(&files).await?;
        self.backup.notify_change();
        Ok(())
    }

    pub async fn save_location(&self, location: Location) -> Result<()> {
        tracing::info!("Saving location: {}", location.path);
        self.locations.update(&location).await?;
        self.backup.notify_change();
        Ok(())
    }

    pub async fn save_search(&self, search: SavedSearch) -> Result<()> {
        tracing::info!("Saving search: {}", search.name);
        self.searches.update(&search).await?;
        self.backup.notify_change();
        Ok(())
    }

    // ===== Removals =====

    /// Remove one tag record without touching files or other tags
    pub async fn remove_tag(&self, id: &str) -> Result<()> {
        tracing::info!("Removing tag: {}", id);
        self.tags.remove(id).await?;
        self.backup.notify_change();
        Ok(())
    }

    /// Remove tags, first untagging every file that carries one of them
    /// and detaching them from their parents
    pub async fn remove_tags(&self, ids: &[Id]) -> Result<()> {
        tracing::info!("Removing tags: {:?}", ids);

        if ids.iter().any(|id| id == ROOT_TAG_ID) {
            return Err(AppError::InvalidTagTree(
                "The root tag cannot be removed".to_string(),
            ));
        }
        if ids.is_empty() {
            return Ok(());
        }

        let removed: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let mut files = self
            .files
            .find_exact(&Condition::contains_any(FileField::Tags, ids))
            .await?;
        for file in &mut files {
            file.tags.retain(|t| !removed.contains(t.as_str()));
        }
        self.files.update_many(&files).await?;
        tracing::debug!("Untagged {} files", files.len());

        let parents: Vec<Tag> = self
            .tags
            .get_all()
            .await?
            .into_iter()
            .filter(|t| !removed.contains(t.id.as_str()))
            .filter(|t| t.sub_tags.iter().any(|c| removed.contains(c.as_str())))
            .map(|mut t| {
                t.sub_tags.retain(|c| !removed.contains(c.as_str()));
                t
            })
            .collect();
        self.tags.update_many(&parents).await?;

        self.tags.remove_many(ids).await?;
        self.backup.notify_change();
        Ok(())
    }

    /// Remove a tag together with every tag below it
    pub async fn remove_tag_subtree(&self, id: &str) -> Result<()> {
        let tree = TagTree::new(self.tags.get_all().await?);
        if tree.get(id).is_none() {
            return Ok(());
        }
        let ids = tree.descendants(id);
        tracing::info!("Removing tag {} and {} descendants", id, ids.len() - 1);
        self.remove_tags(&ids).await
    }

    /// Replace `source` with `target` on every file, then remove `source`.
    ///
    /// Children of `source` move under `target`.
    pub async fn merge_tags(&self, source: &str, target: &str) -> Result<()> {
        tracing::info!("Merging tag {} into {}", source, target);

        if source == target {
            return Err(AppError::InvalidTagTree(
                "Cannot merge a tag into itself".to_string(),
            ));
        }
        if source == ROOT_TAG_ID {
            return Err(AppError::InvalidTagTree(
                "The root tag cannot be merged".to_string(),
            ));
        }

        let tree = TagTree::new(self.tags.get_all().await?);
        let source_tag = tree.get(source).cloned().ok_or_else(|| AppError::NotFound {
            collection: crate::config::TAGS_COLLECTION,
            id: source.to_string(),
        })?;
        let target_tag = tree.get(target).cloned().ok_or_else(|| AppError::NotFound {
            collection: crate::config::TAGS_COLLECTION,
            id: target.to_string(),
        })?;
        if tree.descendants(source).iter().any(|d| d == target) {
            return Err(AppError::InvalidTagTree(format!(
                "Cannot merge tag {} into its descendant {}",
                source, target
            )));
        }

        let mut files = self
            .files
            .find_exact(&Condition::contains_any(FileField::Tags, [source]))
            .await?;
        for file in &mut files {
            let mut seen = HashSet::new();
            file.tags = std::mem::take(&mut file.tags)
                .into_iter()
                .map(|t| if t == source { target.to_string() } else { t })
                .filter(|t| seen.insert(t.clone()))
                .collect();
        }
        self.files.update_many(&files).await?;
        tracing::debug!("Retagged {} files", files.len());

        let mut changed: HashMap<Id, Tag> = HashMap::new();
        for parent in tree.parents_of(source) {
            let mut parent = parent.clone();
            parent.sub_tags.retain(|c| c != source);
            changed.insert(parent.id.clone(), parent);
        }
        if !source_tag.sub_tags.is_empty() {
            let mut target_tag = changed.remove(target).unwrap_or(target_tag);
            for child in &source_tag.sub_tags {
                if !target_tag.sub_tags.contains(child) {
                    target_tag.sub_tags.push(child.clone());
                }
            }
            changed.insert(target_tag.id.clone(), target_tag);
        }
        let changed: Vec<Tag> = changed.into_values().collect();
        self.tags.update_many(&changed).await?;

        self.tags.remove(source).await?;
        self.backup.notify_change();
        Ok(())
    }

    pub async fn remove_files(&self, ids: &[Id]) -> Result<()> {
        tracing::info!("Removing {} files", ids.len());
        self.files.remove_many(ids).await?;
        self.backup.notify_change();
        Ok(())
    }

    /// Remove a location and every file that belongs to it
    pub async fn remove_location(&self, id: &str) -> Result<()> {
        tracing::info!("Removing location: {}", id);

        let file_ids: Vec<Id> = self
            .files
            .find_exact(&Condition::Equals(FileField::LocationId, id.into()))
            .await?
            .into_iter()
            .map(|f| f.id)
            .collect();
        self.files.remove_many(&file_ids).await?;
        tracing::debug!("Removed {} files of location {}", file_ids.len(), id);

        self.locations.remove(id).await?;
        self.backup.notify_change();
        Ok(())
    }

    pub async fn remove_search(&self, id: &str) -> Result<()> {
        tracing::info!("Removing search: {}", id);
        self.searches.remove(id).await?;
        self.backup.notify_change();
        Ok(())
    }

    // ===== Whole database =====

    /// Destroy every collection and start over with only the root tag
    pub async fn clear(&self) -> Result<()> {
        tracing::warn!("Clearing database");
        self.store.clear().await?;
        self.seed_root_tag().await?;
        self.backup.notify_change();
        Ok(())
    }

    /// Write a compact snapshot of the whole store to `path`
    pub async fn backup_to_file(&self, path: &Path) -> Result<()> {
        tracing::info!("Backing up database to {:?}", path);
        write_snapshot(&self.store, path, false).await?;
        Ok(())
    }

    /// Replace the store with the contents of a snapshot file.
    ///
    /// The file is fully parsed and validated before the store is touched;
    /// an invalid file leaves the current data in place.
    pub async fn restore_from_file(&self, path: &Path) -> Result<()> {
        tracing::info!("Restoring database from {:?}", path);

        let snapshot = read_snapshot(path).await?;
        self.store.import_snapshot(&snapshot).await?;
        self.seed_root_tag().await?;
        self.backup.notify_change();

        tracing::info!("Restore completed successfully");
        Ok(())
    }

    /// Number of tags and files in a snapshot file, without importing it
    pub async fn peek_file(&self, path: &Path) -> Result<SnapshotSummary> {
        peek_snapshot(path).await
    }
}
