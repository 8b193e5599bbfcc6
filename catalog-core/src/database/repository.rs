//! Repository layer for database operations
//!
//! `Repository<E>` provides CRUD and structured search over the
//! collection of one entity type. Batch writes run in a transaction.

use super::criteria::{Condition, Criteria, Value};
use super::models::{Entity, EntityField, Id, OrderDirection, Tag};
use super::query::{push_condition, push_criteria, push_order};
use super::tag_tree::TagTree;
use crate::error::{AppError, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Repository over one document collection
pub struct Repository<E: Entity> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn select() -> QueryBuilder<'static, Sqlite> {
        QueryBuilder::new(format!("SELECT doc FROM {}", E::COLLECTION))
    }

    fn decode(docs: Vec<String>) -> Result<Vec<E>> {
        docs.iter()
            .map(|doc| serde_json::from_str(doc).map_err(AppError::from))
            .collect()
    }

    /// Total number of records
    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", E::COLLECTION))
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }

    /// Number of records matching an exact condition, without loading them
    pub async fn count_exact(&self, condition: &Condition<E::Field>) -> Result<usize> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", E::COLLECTION));
        push_condition(&mut qb, condition)?;

        let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count as usize)
    }

    /// All records in insertion order
    pub async fn get_all(&self) -> Result<Vec<E>> {
        let docs: Vec<String> =
            sqlx::query_scalar(&format!("SELECT doc FROM {} ORDER BY seq ASC", E::COLLECTION))
                .fetch_all(&self.pool)
                .await?;

        Self::decode(docs)
    }

    /// All records sorted by one field; ties keep insertion order
    pub async fn get_all_ordered(&self, key: E::Field, dir: OrderDirection) -> Result<Vec<E>> {
        let mut qb = Self::select();
        push_order(&mut qb, key.property(), dir);

        let docs: Vec<String> = qb.build_query_scalar::<String>().fetch_all(&self.pool).await?;
        Self::decode(docs)
    }

    /// Records for the given IDs, in the same order; `None` where an ID is unknown
    pub async fn get_by_ids(&self, ids: &[Id]) -> Result<Vec<Option<E>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, String)> = sqlx::query_as(&format!(
            "SELECT id, doc FROM {} WHERE id IN (SELECT value FROM json_each(?))",
            E::COLLECTION
        ))
        .bind(serde_json::to_string(ids)?)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<String, E> = HashMap::with_capacity(rows.len());
        for (id, doc) in rows {
            by_id.insert(id, serde_json::from_str(&doc)?);
        }

        Ok(ids.iter().map(|id| by_id.get(id).cloned()).collect())
    }

    /// Records whose field equals `value`
    pub async fn get_by_key(
        &self,
        key: E::Field,
        value: impl Into<Value>,
    ) -> Result<Vec<E>> {
        self.find_exact(&Condition::Equals(key, value.into())).await
    }

    /// Insert a record; fails with `DuplicateKey` if the ID is taken
    pub async fn create(&self, entity: &E) -> Result<()> {
        let doc = serde_json::to_string(entity)?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, doc) VALUES (?, ?)",
            E::COLLECTION
        ))
        .bind(entity.id())
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::on_insert(e, E::COLLECTION, entity.id()))?;

        tracing::debug!("Created {} record: {}", E::COLLECTION, entity.id());
        Ok(())
    }

    /// Insert several records; nothing is inserted if any ID is taken
    pub async fn create_many(&self, entities: &[E]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let sql = format!("INSERT INTO {} (id, doc) VALUES (?, ?)", E::COLLECTION);
        let mut tx = self.pool.begin().await?;

        for entity in entities {
            let doc = serde_json::to_string(entity)?;
            sqlx::query(&sql)
                .bind(entity.id())
                .bind(doc)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::on_insert(e, E::COLLECTION, entity.id()))?;
        }

        tx.commit().await?;

        tracing::debug!("Created {} {} records", entities.len(), E::COLLECTION);
        Ok(())
    }

    /// Replace a record by ID; fails with `NotFound` if it does not exist
    pub async fn update(&self, entity: &E) -> Result<()> {
        let doc = serde_json::to_string(entity)?;

        let rows_affected = sqlx::query(&format!(
            "UPDATE {} SET doc = ? WHERE id = ?",
            E::COLLECTION
        ))
        .bind(doc)
        .bind(entity.id())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound {
                collection: E::COLLECTION,
                id: entity.id().to_string(),
            });
        }

        tracing::debug!("Updated {} record: {}", E::COLLECTION, entity.id());
        Ok(())
    }

    /// Replace several records; nothing is written if any ID is missing
    pub async fn update_many(&self, entities: &[E]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let sql = format!("UPDATE {} SET doc = ? WHERE id = ?", E::COLLECTION);
        let mut tx = self.pool.begin().await?;

        for entity in entities {
            let doc = serde_json::to_string(entity)?;
            let rows_affected = sqlx::query(&sql)
                .bind(doc)
                .bind(entity.id())
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if rows_affected == 0 {
                // Dropping the transaction rolls it back
                return Err(AppError::NotFound {
                    collection: E::COLLECTION,
                    id: entity.id().to_string(),
                });
            }
        }

        tx.commit().await?;

        tracing::debug!("Updated {} {} records", entities.len(), E::COLLECTION);
        Ok(())
    }

    /// Delete a record; unknown IDs are ignored
    pub async fn remove(&self, id: &str) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", E::COLLECTION))
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Removed {} record: {}", E::COLLECTION, id);
        Ok(())
    }

    /// Delete several records; unknown IDs are ignored
    pub async fn remove_many(&self, ids: &[Id]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let removed = sqlx::query(&format!(
            "DELETE FROM {} WHERE id IN (SELECT value FROM json_each(?))",
            E::COLLECTION
        ))
        .bind(serde_json::to_string(ids)?)
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::debug!("Removed {} of {} {} records", removed, ids.len(), E::COLLECTION);
        Ok(())
    }

    /// Records matching all (or, with `match_any`, any) of the criteria,
    /// sorted by `order`. No criteria returns every record.
    pub async fn find(
        &self,
        criteria: &[Criteria],
        order: E::Field,
        dir: OrderDirection,
        match_any: bool,
    ) -> Result<Vec<E>> {
        let tags = if criteria.iter().any(Criteria::is_recursive) {
            TagTree::new(Repository::<Tag>::new(self.pool.clone()).get_all().await?)
        } else {
            TagTree::default()
        };

        let mut qb = Self::select();
        push_criteria(&mut qb, criteria, match_any, &tags)?;
        push_order(&mut qb, order.property(), dir);

        let docs: Vec<String> = qb.build_query_scalar::<String>().fetch_all(&self.pool).await?;

        tracing::debug!(
            "Found {} {} records for {} criteria (match_any: {})",
            docs.len(),
            E::COLLECTION,
            criteria.len(),
            match_any
        );

        Self::decode(docs)
    }

    /// Records matching one exact condition, in insertion order
    pub async fn find_exact(&self, condition: &Condition<E::Field>) -> Result<Vec<E>> {
        let mut qb = Self::select();
        push_condition(&mut qb, condition)?;
        qb.push(" ORDER BY seq ASC");

        let docs: Vec<String> = qb.build_query_scalar::<String>().fetch_all(&self.pool).await?;
        Self::decode(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::criteria::{
        BinaryOperator, NumberKey, NumberOperator, StringOperator, TagOperator, TextKey,
    };
    use crate::database::models::{File, FileField, TagField};
    use crate::database::Store;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    async fn create_test_store() -> Store {
        Store::open_in_memory().await.unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn file(id: &str, name: &str, size: u64, tags: &[&str]) -> File {
        File {
            id: id.to_string(),
            location_id: "loc".to_string(),
            absolute_path: format!("/photos/{}", name),
            name: name.to_string(),
            extension: name.rsplit('.').next().unwrap_or_default().to_string(),
            size,
            width: 100,
            height: 100,
            date_added: day(2024, 1, 1),
            date_modified: day(2024, 1, 1),
            date_created: day(2024, 1, 1),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn seed_files(repo: &Repository<File>) -> Vec<File> {
        let files = vec![
            file("f1", "Cat.jpg", 300, &["cat"]),
            file("f2", "dog.png", 100, &["dog"]),
            file("f3", "sunset.jpg", 200, &[]),
            file("f4", "dog-and-cat.png", 200, &["dog", "cat"]),
        ];
        repo.create_many(&files).await.unwrap();
        files
    }

    fn ids(files: &[File]) -> Vec<&str> {
        files.iter().map(|f| f.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get_by_ids() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        let files = seed_files(&repo).await;

        let fetched = repo
            .get_by_ids(&["f3".to_string(), "missing".to_string(), "f1".to_string()])
            .await
            .unwrap();

        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].as_ref(), Some(&files[2]));
        assert!(fetched[1].is_none());
        assert_eq!(fetched[2].as_ref(), Some(&files[0]));
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let store = create_test_store().await;
        let repo = store.repository::<Tag>();

        repo.create(&Tag::new("t1", "Nature")).await.unwrap();
        let result = repo.create(&Tag::new("t1", "Other")).await;

        assert!(matches!(result, Err(AppError::DuplicateKey { .. })));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_many_is_all_or_nothing() {
        let store = create_test_store().await;
        let repo = store.repository::<Tag>();
        repo.create(&Tag::new("t2", "Existing")).await.unwrap();

        let result = repo
            .create_many(&[Tag::new("t1", "New"), Tag::new("t2", "Clash")])
            .await;

        assert!(matches!(result, Err(AppError::DuplicateKey { .. })));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let store = create_test_store().await;
        let repo = store.repository::<Tag>();

        let result = repo.update(&Tag::new("nope", "Missing")).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));

        repo.create(&Tag::new("t1", "Nature")).await.unwrap();
        let result = repo
            .update_many(&[Tag::new("t1", "Renamed"), Tag::new("nope", "Missing")])
            .await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));

        // The batch rolled back
        let tags = repo.get_all().await.unwrap();
        assert_eq!(tags[0].name, "Nature");
    }

    #[tokio::test]
    async fn test_update_replaces_document() {
        let store = create_test_store().await;
        let repo = store.repository::<Tag>();
        repo.create(&Tag::new("t1", "Nature")).await.unwrap();

        let mut tag = Tag::new("t1", "Landscape");
        tag.color = "#00ff00".to_string();
        repo.update(&tag).await.unwrap();

        let fetched = repo.get_by_ids(&["t1".to_string()]).await.unwrap();
        assert_eq!(fetched[0].as_ref(), Some(&tag));
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        repo.remove("missing").await.unwrap();
        repo.remove_many(&["f1".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_all_ordered_is_stable() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let asc = repo
            .get_all_ordered(FileField::Size, OrderDirection::Asc)
            .await
            .unwrap();
        assert_eq!(ids(&asc), vec!["f2", "f3", "f4", "f1"]);

        // Ties keep insertion order in both directions
        let desc = repo
            .get_all_ordered(FileField::Size, OrderDirection::Desc)
            .await
            .unwrap();
        assert_eq!(ids(&desc), vec!["f1", "f3", "f4", "f2"]);
    }

    #[tokio::test]
    async fn test_get_by_key() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let jpgs = repo.get_by_key(FileField::Extension, "jpg").await.unwrap();
        assert_eq!(ids(&jpgs), vec!["f1", "f3"]);

        let sized = repo.get_by_key(FileField::Size, 200u64).await.unwrap();
        assert_eq!(ids(&sized), vec!["f3", "f4"]);

        // Array fields match on membership
        let cats = repo.get_by_key(FileField::Tags, "cat").await.unwrap();
        assert_eq!(ids(&cats), vec!["f1", "f4"]);
    }

    #[tokio::test]
    async fn test_find_without_criteria_matches_get_all_ordered() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let found = repo
            .find(&[], FileField::Name, OrderDirection::Desc, false)
            .await
            .unwrap();
        let ordered = repo
            .get_all_ordered(FileField::Name, OrderDirection::Desc)
            .await
            .unwrap();

        assert_eq!(found, ordered);
    }

    #[tokio::test]
    async fn test_find_string_operators() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let find = |op, value: &str| {
            let repo = repo.clone();
            let criteria = vec![Criteria::text(TextKey::Name, op, value)];
            async move {
                repo.find(&criteria, FileField::DateAdded, OrderDirection::Asc, false)
                    .await
                    .unwrap()
            }
        };

        // contains ignores case, equals does not
        assert_eq!(ids(&find(StringOperator::Contains, "CAT").await), vec!["f1", "f4"]);
        assert_eq!(ids(&find(StringOperator::NotContains, "cat").await), vec!["f2", "f3"]);
        assert_eq!(ids(&find(StringOperator::Equals, "cat.jpg").await), Vec::<&str>::new());
        assert_eq!(ids(&find(StringOperator::Equals, "Cat.jpg").await), vec!["f1"]);
        assert_eq!(ids(&find(StringOperator::NotEqual, "Cat.jpg").await).len(), 3);
        assert_eq!(ids(&find(StringOperator::StartsWith, "dog").await), vec!["f2", "f4"]);
        assert_eq!(ids(&find(StringOperator::NotStartsWith, "dog").await), vec!["f1", "f3"]);
        assert_eq!(find(StringOperator::Contains, "").await.len(), 4);
    }

    #[tokio::test]
    async fn test_find_number_and_extension() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let criteria = vec![
            Criteria::number(NumberKey::Size, NumberOperator::GreaterThanOrEquals, 200.0),
            Criteria::extension(BinaryOperator::Equals, "png"),
        ];

        let all = repo
            .find(&criteria, FileField::Size, OrderDirection::Asc, false)
            .await
            .unwrap();
        assert_eq!(ids(&all), vec!["f4"]);

        let any = repo
            .find(&criteria, FileField::Size, OrderDirection::Asc, true)
            .await
            .unwrap();
        assert_eq!(ids(&any), vec!["f2", "f3", "f4", "f1"]);

        // OR results are a superset of AND results
        assert!(all.iter().all(|f| any.contains(f)));
    }

    #[tokio::test]
    async fn test_find_date_uses_day_granularity() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();

        let mut early = file("f1", "a.jpg", 1, &[]);
        early.date_added = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 1).unwrap();
        let mut late = file("f2", "b.jpg", 1, &[]);
        late.date_added = Utc.with_ymd_and_hms(2024, 5, 10, 23, 59, 59).unwrap();
        let mut next = file("f3", "c.jpg", 1, &[]);
        next.date_added = Utc.with_ymd_and_hms(2024, 5, 11, 8, 0, 0).unwrap();
        repo.create_many(&[early, late, next]).await.unwrap();

        let target = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let same_day = repo
            .find(
                &[Criteria::date(NumberOperator::Equals, target)],
                FileField::DateAdded,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert_eq!(ids(&same_day), vec!["f1", "f2"]);

        let after = repo
            .find(
                &[Criteria::date(NumberOperator::GreaterThan, target)],
                FileField::DateAdded,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert_eq!(ids(&after), vec!["f3"]);
    }

    #[tokio::test]
    async fn test_find_untagged_and_tagged() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let untagged = repo
            .find(
                &[Criteria::tag(TagOperator::Contains, None)],
                FileField::Name,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert_eq!(ids(&untagged), vec!["f3"]);

        let tagged = repo
            .find(
                &[Criteria::tag(TagOperator::NotContains, None)],
                FileField::Size,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert_eq!(ids(&tagged), vec!["f2", "f4", "f1"]);
    }

    #[tokio::test]
    async fn test_find_recursive_tags() {
        let store = create_test_store().await;
        store
            .repository::<Tag>()
            .create_many(&[
                Tag::new("animal", "Animal").with_sub_tags(vec!["dog".into(), "cat".into()]),
                Tag::new("dog", "Dog"),
                Tag::new("cat", "Cat"),
            ])
            .await
            .unwrap();
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let direct = repo
            .find(
                &[Criteria::tag(TagOperator::Contains, Some("animal".into()))],
                FileField::Name,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert!(direct.is_empty());

        let recursive = repo
            .find(
                &[Criteria::tag(TagOperator::ContainsRecursively, Some("animal".into()))],
                FileField::Size,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert_eq!(ids(&recursive), vec!["f2", "f4", "f1"]);

        let not_recursive = repo
            .find(
                &[Criteria::tag(TagOperator::NotContainsRecursively, Some("animal".into()))],
                FileField::Size,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert_eq!(ids(&not_recursive), vec!["f3"]);

        let not_dog = repo
            .find(
                &[Criteria::tag(TagOperator::NotContains, Some("dog".into()))],
                FileField::Size,
                OrderDirection::Asc,
                false,
            )
            .await
            .unwrap();
        assert_eq!(ids(&not_dog), vec!["f3", "f1"]);
    }

    #[tokio::test]
    async fn test_find_exact_and_count_exact() {
        let store = create_test_store().await;
        let repo = store.repository::<File>();
        seed_files(&repo).await;

        let with_tags = repo
            .find_exact(&Condition::contains_any(FileField::Tags, ["cat", "dog"]))
            .await
            .unwrap();
        assert_eq!(ids(&with_tags), vec!["f1", "f2", "f4"]);

        let untagged = repo
            .count_exact(&Condition::Contains(FileField::Tags, Vec::new()))
            .await
            .unwrap();
        assert_eq!(untagged, 1);

        let in_dir = repo
            .count_exact(&Condition::StartsWith(
                FileField::AbsolutePath,
                "/photos/dog".to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(in_dir, 2);

        let tags = store.repository::<Tag>();
        tags.create(&Tag::new("t1", "Nature")).await.unwrap();
        let found = tags
            .find_exact(&Condition::Equals(TagField::Name, "Nature".into()))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
