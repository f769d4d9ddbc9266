//! # Catalog Model
//!
//! Types describing what the catalog holds and what a search hands back.
//!
//! ## Entities
//!
//! The catalog is a tree of **collections** (folders) holding **data objects**
//! (files). Both kinds carry metadata attributes, and every entity also
//! inherits the attributes of its ancestors. [`EntityKind`] selects which of
//! the two hierarchies a search runs against.
//!
//! ## Levels
//!
//! Each inherited attribute row records where in the ancestry it came from:
//!
//! ```text
//! /Archive/ProjectX/SampleA/run1.fastq
//!   level 1  run1.fastq           label "DataObject"
//!   level 2  SampleA              label "Sample"   (its collection_type)
//!   level 3  ProjectX             label "Project"
//!   level 4  Archive              label "Archive"
//! ```
//!
//! For a collection, level 1 is the collection itself. Labels come from the
//! `collection_type` attribute of the collection owning the row.
//!
//! ## Search Results
//!
//! Path searches return plain `String` paths. Detailed searches return one
//! [`DetailedEntry`] per matching entity, carrying the entity record and every
//! hierarchical [`MetadataEntry`] attached to it.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute naming the level label of the collection that owns it.
pub const COLLECTION_TYPE_ATTRIBUTE: &str = "collection_type";

/// Level label of the rows a data object carries itself.
pub const DATA_OBJECT_LEVEL_LABEL: &str = "DataObject";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Collection,
    DataObject,
}

impl EntityKind {
    /// The published hierarchy index holding this kind's attribute rows.
    pub const fn index_table(self) -> &'static str {
        match self {
            Self::Collection => "collection_hierarchy_meta",
            Self::DataObject => "data_object_hierarchy_meta",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::DataObject => "data object",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hierarchical attribute row attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    pub attribute: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_label: Option<String>,
}

impl MetadataEntry {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            unit: None,
            level: None,
            level_label: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: i64,
    pub path: String,
    pub parent_path: Option<String>,
    pub owner_name: String,
    pub owner_zone: Option<String>,
    pub map_id: Option<i64>,
    pub inheritance: Option<String>,
    pub comments: Option<String>,
    pub info1: Option<String>,
    pub info2: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub collection_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectRecord {
    pub id: i64,
    pub collection_id: i64,
    pub collection_path: String,
    pub path: String,
    pub data_size: Option<i64>,
    pub data_path: Option<String>,
    pub owner_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityRecord {
    Collection(CollectionRecord),
    DataObject(DataObjectRecord),
}

impl EntityRecord {
    pub fn id(&self) -> i64 {
        match self {
            Self::Collection(c) => c.id,
            Self::DataObject(d) => d.id,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Collection(c) => &c.path,
            Self::DataObject(d) => &d.path,
        }
    }
}

/// A matching entity with all of its hierarchical attribute rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedEntry {
    pub entity: EntityRecord,
    pub metadata: Vec<MetadataEntry>,
}

impl DetailedEntry {
    pub fn path(&self) -> &str {
        self.entity.path()
    }
}

/// Distinct attribute names observed at one level label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelAttributes {
    pub level_label: Option<String>,
    pub attributes: BTreeSet<String>,
}

/// Convert a catalog epoch-seconds column into a timestamp.
pub(crate) fn timestamp_from_epoch(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// Split `path` into (parent collection path, final name).
pub(crate) fn split_path(path: &str) -> Option<(String, String)> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    let name = &trimmed[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { "/" } else { &trimmed[..idx] };
    Some((parent.to_string(), name.to_string()))
}

/// Parent collection path; `None` for the root.
pub(crate) fn parent_path(path: &str) -> Option<String> {
    split_path(path).map(|(parent, _)| parent)
}
