//! # Query Execution
//!
//! Runs a [`CompiledQuery`] against one kind's published hierarchy index.
//! Every statement selects from the index under the `entity` alias the
//! compiled clause is written against, so the clause drops in unchanged.
//!
//! Results are ordered by path ascending; paths are unique per entity, which
//! keeps pages stable and makes `count` agree with the unpaginated path list.
//!
//! Detailed searches run in two steps: the path search itself, then a
//! projection of every attribute row for exactly those paths, grouped into
//! one [`DetailedEntry`] per entity. The projection binds at most
//! [`DETAIL_BATCH_SIZE`] paths per statement, so result size never runs into
//! the store's bound parameter limit.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::model::{
    parent_path, split_path, timestamp_from_epoch, CollectionRecord, DataObjectRecord,
    DetailedEntry, EntityKind, EntityRecord, MetadataEntry, COLLECTION_TYPE_ATTRIBUTE,
};
use crate::query::access::{access_args, ACCESSIBLE_OBJECTS_SQL};
use crate::query::operators::ENTITY_ALIAS;
use crate::query::{CompiledQuery, Page, QueryArg};
use crate::store::{query_rows, CatalogBackend, CatalogRow, FromCatalogRow, Statement};

/// Paths bound per detail projection statement.
pub const DETAIL_BATCH_SIZE: usize = 1000;

const METADATA_COLUMNS: &str =
    "meta.meta_attr_name, meta.meta_attr_value, meta.meta_attr_unit, meta.level, meta.level_label";

pub struct Executor<'a, B: CatalogBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: CatalogBackend + ?Sized> Executor<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Matching paths in ascending order. `offset` and `limit` go together.
    pub fn paths(
        &self,
        query: &CompiledQuery,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<String>> {
        let page = Page::from_parts(offset, limit)?;
        let mut sql = format!(
            "SELECT DISTINCT {ENTITY_ALIAS}.object_path FROM {table} {ENTITY_ALIAS} \
             WHERE {clause} ORDER BY {ENTITY_ALIAS}.object_path",
            table = query.kind().index_table(),
            clause = query.clause(),
        );
        let mut args = query.args().to_vec();
        if let Some(page) = page {
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(QueryArg::Integer(i64::from(page.limit)));
            args.push(QueryArg::Integer(i64::from(page.offset)));
        }

        let paths: Vec<String> = query_rows(self.backend, &Statement::new(sql, args))?;
        tracing::debug!(kind = %query.kind(), matches = paths.len(), "path search finished");
        Ok(paths)
    }

    /// Distinct matching entities, ignoring pagination.
    pub fn count(&self, query: &CompiledQuery) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(DISTINCT {ENTITY_ALIAS}.object_id) FROM {table} {ENTITY_ALIAS} WHERE {clause}",
            table = query.kind().index_table(),
            clause = query.clause(),
        );
        self.backend
            .query_count(&Statement::new(sql, query.args().to_vec()))
    }

    pub fn detailed_paths(
        &self,
        query: &CompiledQuery,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<DetailedEntry>> {
        let paths = self.paths(query, offset, limit)?;
        self.project(query.kind(), &paths)
    }

    /// Parent collections of the matching data objects, deduplicated in the
    /// order first seen. Pagination applies to the data objects.
    pub fn parent_paths(
        &self,
        query: &CompiledQuery,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<String>> {
        let paths = self.paths(query, offset, limit)?;
        let mut seen = HashSet::new();
        Ok(paths
            .iter()
            .filter_map(|path| parent_path(path))
            .filter(|parent| seen.insert(parent.clone()))
            .collect())
    }

    pub fn detailed_parent_paths(
        &self,
        query: &CompiledQuery,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<DetailedEntry>> {
        let parents = self.parent_paths(query, offset, limit)?;
        self.project(EntityKind::Collection, &parents)
    }

    /// One entry per path, in the order given. Paths without index rows are
    /// skipped.
    pub fn project(&self, kind: EntityKind, paths: &[String]) -> Result<Vec<DetailedEntry>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_path: HashMap<String, DetailedEntry> = HashMap::with_capacity(paths.len());
        for batch in paths.chunks(DETAIL_BATCH_SIZE) {
            let statement = detail_statement(kind, batch);
            for entry in group_by_entity(self.detail_rows(kind, &statement)?) {
                by_path.insert(entry.path().to_string(), entry);
            }
        }
        tracing::debug!(%kind, paths = paths.len(), "projected detailed entries");
        Ok(paths.iter().filter_map(|path| by_path.remove(path)).collect())
    }

    fn detail_rows(&self, kind: EntityKind, statement: &Statement) -> Result<Vec<DetailRow>> {
        Ok(match kind {
            EntityKind::Collection => query_rows::<CollectionDetailRow, B>(self.backend, statement)?
                .into_iter()
                .map(|row| row.0)
                .collect(),
            EntityKind::DataObject => query_rows::<DataObjectDetailRow, B>(self.backend, statement)?
                .into_iter()
                .map(|row| row.0)
                .collect(),
        })
    }

    /// The entity's own attribute rows, read from the live catalog rather
    /// than the index: level 1, no label. With a principal, an entity it
    /// cannot see yields nothing.
    pub fn own_metadata(
        &self,
        kind: EntityKind,
        path: &str,
        principal: Option<&str>,
    ) -> Result<Vec<MetadataEntry>> {
        let (mut sql, mut args) = match kind {
            EntityKind::Collection => (
                "SELECT attr.meta_attr_name, attr.meta_attr_value, attr.meta_attr_unit, 1, NULL \
                 FROM metadata_attribute attr \
                 JOIN collection coll ON coll.coll_id = attr.object_id \
                 WHERE coll.coll_name = ?"
                    .to_string(),
                vec![QueryArg::from(path)],
            ),
            EntityKind::DataObject => {
                let Some((collection_path, name)) = split_path(path) else {
                    return Ok(Vec::new());
                };
                (
                    "SELECT attr.meta_attr_name, attr.meta_attr_value, attr.meta_attr_unit, 1, NULL \
                     FROM metadata_attribute attr \
                     JOIN data_object data ON data.data_id = attr.object_id \
                     JOIN collection coll ON coll.coll_id = data.coll_id \
                     WHERE coll.coll_name = ? AND data.data_name = ?"
                        .to_string(),
                    vec![QueryArg::from(collection_path), QueryArg::from(name)],
                )
            }
        };
        if let Some(principal) = principal {
            sql.push_str(&format!(" AND attr.object_id IN ({ACCESSIBLE_OBJECTS_SQL})"));
            args.extend(access_args(principal));
        }
        sql.push_str(" ORDER BY attr.meta_attr_name, attr.meta_id");
        query_rows(self.backend, &Statement::new(sql, args))
    }

    /// Hierarchical rows of the entity at `path` from `min_level` upwards,
    /// ordered by level.
    pub fn metadata_at_level(
        &self,
        kind: EntityKind,
        path: &str,
        min_level: u32,
    ) -> Result<Vec<MetadataEntry>> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM {table} meta \
             WHERE meta.object_path = ? AND meta.level >= ? \
             ORDER BY meta.level, meta.meta_attr_name, meta.meta_attr_value",
            table = kind.index_table(),
        );
        let args = vec![
            QueryArg::from(path),
            QueryArg::Integer(i64::from(min_level)),
        ];
        query_rows(self.backend, &Statement::new(sql, args))
    }
}

fn detail_statement(kind: EntityKind, paths: &[String]) -> Statement {
    let placeholders = vec!["?"; paths.len()].join(", ");
    let (entity_columns, joins) = match kind {
        EntityKind::Collection => (
            format!(
                "coll.coll_id, coll.coll_name, coll.parent_coll_name, coll.coll_owner_name, \
                 coll.coll_owner_zone, coll.coll_map_id, coll.coll_inheritance, coll.coll_comments, \
                 coll.coll_info1, coll.coll_info2, coll.create_ts, \
                 (SELECT label.meta_attr_value FROM metadata_attribute label \
                  WHERE label.object_id = coll.coll_id \
                  AND label.meta_attr_name = '{COLLECTION_TYPE_ATTRIBUTE}' \
                  ORDER BY label.meta_id LIMIT 1)"
            ),
            "JOIN collection coll ON coll.coll_id = meta.object_id",
        ),
        EntityKind::DataObject => (
            "data.data_id, data.coll_id, coll.coll_name, meta.object_path, data.data_size, \
             data.data_path, data.data_owner_name, data.create_ts"
                .to_string(),
            "JOIN data_object data ON data.data_id = meta.object_id \
             JOIN collection coll ON coll.coll_id = data.coll_id",
        ),
    };
    let sql = format!(
        "SELECT {entity_columns}, {METADATA_COLUMNS} FROM {table} meta {joins} \
         WHERE meta.object_path IN ({placeholders}) \
         ORDER BY meta.object_path, meta.level, meta.meta_attr_name, meta.meta_attr_value",
        table = kind.index_table(),
    );
    let args = paths.iter().map(|p| QueryArg::from(p.as_str())).collect();
    Statement::new(sql, args)
}

/// Rows arrive ordered by path, so each entity's rows are contiguous.
fn group_by_entity(rows: Vec<DetailRow>) -> Vec<DetailedEntry> {
    let mut entries: Vec<DetailedEntry> = Vec::new();
    for row in rows {
        match entries.last_mut() {
            Some(last) if last.entity.id() == row.entity.id() => last.metadata.push(row.metadata),
            _ => entries.push(DetailedEntry {
                entity: row.entity,
                metadata: vec![row.metadata],
            }),
        }
    }
    entries
}

struct DetailRow {
    entity: EntityRecord,
    metadata: MetadataEntry,
}

struct CollectionDetailRow(DetailRow);

struct DataObjectDetailRow(DetailRow);

impl FromCatalogRow for MetadataEntry {
    fn from_row(row: &dyn CatalogRow) -> Result<Self> {
        metadata_from(row, 0)
    }
}

/// Decode the five metadata columns starting at `start`.
fn metadata_from(row: &dyn CatalogRow, start: usize) -> Result<MetadataEntry> {
    let level = row
        .integer(start + 3)?
        .map(u32::try_from)
        .transpose()
        .map_err(|e| crate::error::CatalogError::backend("reading metadata level", e))?;
    Ok(MetadataEntry {
        attribute: row.required_text(start, "meta_attr_name")?,
        value: row.text(start + 1)?.unwrap_or_default(),
        unit: row.text(start + 2)?,
        level,
        level_label: row.text(start + 4)?,
    })
}

impl FromCatalogRow for CollectionDetailRow {
    fn from_row(row: &dyn CatalogRow) -> Result<Self> {
        let record = CollectionRecord {
            id: row.required_integer(0, "coll_id")?,
            path: row.required_text(1, "coll_name")?,
            parent_path: row.text(2)?,
            owner_name: row.required_text(3, "coll_owner_name")?,
            owner_zone: row.text(4)?,
            map_id: row.integer(5)?,
            inheritance: row.text(6)?,
            comments: row.text(7)?,
            info1: row.text(8)?,
            info2: row.text(9)?,
            created_at: timestamp_from_epoch(row.integer(10)?),
            collection_type: row.text(11)?,
        };
        Ok(Self(DetailRow {
            entity: EntityRecord::Collection(record),
            metadata: metadata_from(row, 12)?,
        }))
    }
}

impl FromCatalogRow for DataObjectDetailRow {
    fn from_row(row: &dyn CatalogRow) -> Result<Self> {
        let record = DataObjectRecord {
            id: row.required_integer(0, "data_id")?,
            collection_id: row.required_integer(1, "coll_id")?,
            collection_path: row.required_text(2, "coll_name")?,
            path: row.required_text(3, "object_path")?,
            data_size: row.integer(4)?,
            data_path: row.text(5)?,
            owner_name: row.required_text(6, "data_owner_name")?,
            created_at: timestamp_from_epoch(row.integer(7)?),
        };
        Ok(Self(DetailRow {
            entity: EntityRecord::DataObject(record),
            metadata: metadata_from(row, 8)?,
        }))
    }
}
