//! Database models
//!
//! Rust structs representing the documents stored in each collection.
//! Entities never hold another entity, only its ID. All models use serde
//! with camelCase property names, which are also the JSON paths the
//! query layer filters and sorts on.

use super::criteria::Criteria;
use crate::config::{
    FILES_COLLECTION, LOCATIONS_COLLECTION, SEARCHES_COLLECTION, TAGS_COLLECTION,
};
use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier shared by every entity type
pub type Id = String;

/// Generate a fresh random identifier
pub fn new_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Current time truncated to the millisecond precision documents are stored with
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// A document property that can be indexed, matched and sorted on
pub trait EntityField: Copy + fmt::Debug + Send + Sync + 'static {
    /// JSON property holding this field inside a document
    fn property(self) -> &'static str;

    /// Whether the property holds a JSON array; equality then means membership
    fn is_array(self) -> bool {
        false
    }
}

/// A record type stored in its own collection.
///
/// Implementors declare the collection name, the fields that get an
/// expression index, and how to read their unique ID.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    /// Table backing this entity type
    const COLLECTION: &'static str;

    /// Properties callers may look up, filter and order by
    type Field: EntityField;

    /// Fields that get an expression index in the schema
    const INDEXES: &'static [Self::Field];

    fn id(&self) -> &str;
}

/// Sort direction for ordered reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// An image file inside a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: Id,
    pub location_id: Id,
    pub absolute_path: String,
    pub name: String,
    /// Lowercase extension without the dot
    pub extension: String,
    /// Size in bytes
    pub size: u64,
    pub width: u32,
    pub height: u32,
    #[serde(with = "ts_milliseconds")]
    pub date_added: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub date_modified: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub date_created: DateTime<Utc>,
    /// Tag IDs in the order they were assigned
    #[serde(default)]
    pub tags: Vec<Id>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileField {
    Id,
    LocationId,
    AbsolutePath,
    Name,
    Extension,
    Size,
    Width,
    Height,
    DateAdded,
    DateModified,
    DateCreated,
    Tags,
}

impl EntityField for FileField {
    fn property(self) -> &'static str {
        match self {
            FileField::Id => "id",
            FileField::LocationId => "locationId",
            FileField::AbsolutePath => "absolutePath",
            FileField::Name => "name",
            FileField::Extension => "extension",
            FileField::Size => "size",
            FileField::Width => "width",
            FileField::Height => "height",
            FileField::DateAdded => "dateAdded",
            FileField::DateModified => "dateModified",
            FileField::DateCreated => "dateCreated",
            FileField::Tags => "tags",
        }
    }

    fn is_array(self) -> bool {
        matches!(self, FileField::Tags)
    }
}

impl Entity for File {
    const COLLECTION: &'static str = FILES_COLLECTION;
    type Field = FileField;
    const INDEXES: &'static [FileField] = &[
        FileField::LocationId,
        FileField::AbsolutePath,
        FileField::Name,
        FileField::Extension,
        FileField::Size,
        FileField::Width,
        FileField::Height,
        FileField::DateAdded,
        FileField::DateModified,
        FileField::DateCreated,
    ];

    fn id(&self) -> &str {
        &self.id
    }
}

/// A node of the tag tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(with = "ts_milliseconds")]
    pub date_added: DateTime<Utc>,
    /// Child tag IDs; the order is the display order
    #[serde(default)]
    pub sub_tags: Vec<Id>,
}

impl Tag {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: String::new(),
            is_hidden: false,
            date_added: timestamp_now(),
            sub_tags: Vec::new(),
        }
    }

    pub fn with_sub_tags(mut self, sub_tags: Vec<Id>) -> Self {
        self.sub_tags = sub_tags;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagField {
    Id,
    Name,
    Color,
    IsHidden,
    DateAdded,
}

impl EntityField for TagField {
    fn property(self) -> &'static str {
        match self {
            TagField::Id => "id",
            TagField::Name => "name",
            TagField::Color => "color",
            TagField::IsHidden => "isHidden",
            TagField::DateAdded => "dateAdded",
        }
    }
}

impl Entity for Tag {
    const COLLECTION: &'static str = TAGS_COLLECTION;
    type Field = TagField;
    const INDEXES: &'static [TagField] = &[TagField::Name, TagField::DateAdded];

    fn id(&self) -> &str {
        &self.id
    }
}

/// A watched directory that files are imported from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Id,
    pub path: String,
    #[serde(with = "ts_milliseconds")]
    pub date_added: DateTime<Utc>,
    /// Exclusion rules for directories below `path`
    #[serde(default)]
    pub sub_locations: Vec<SubLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubLocation {
    pub name: String,
    #[serde(default)]
    pub is_excluded: bool,
    #[serde(default)]
    pub sub_locations: Vec<SubLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationField {
    Id,
    Path,
    DateAdded,
}

impl EntityField for LocationField {
    fn property(self) -> &'static str {
        match self {
            LocationField::Id => "id",
            LocationField::Path => "path",
            LocationField::DateAdded => "dateAdded",
        }
    }
}

impl Entity for Location {
    const COLLECTION: &'static str = LOCATIONS_COLLECTION;
    type Field = LocationField;
    const INDEXES: &'static [LocationField] = &[LocationField::Path, LocationField::DateAdded];

    fn id(&self) -> &str {
        &self.id
    }
}

/// A named, manually ordered search the user saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub criteria: Vec<Criteria>,
    #[serde(default)]
    pub match_any: bool,
    /// Rank in the user's manual ordering
    pub position: f64,
    #[serde(with = "ts_milliseconds", default = "timestamp_now")]
    pub date_added: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchField {
    Id,
    Name,
    Position,
    DateAdded,
}

impl EntityField for SearchField {
    fn property(self) -> &'static str {
        match self {
            SearchField::Id => "id",
            SearchField::Name => "name",
            SearchField::Position => "position",
            SearchField::DateAdded => "dateAdded",
        }
    }
}

impl Entity for SavedSearch {
    const COLLECTION: &'static str = SEARCHES_COLLECTION;
    type Field = SearchField;
    const INDEXES: &'static [SearchField] = &[SearchField::Position];

    fn id(&self) -> &str {
        &self.id
    }
}
