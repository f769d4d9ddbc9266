//! Catalog DDL and index maintenance statements.

use crate::model::{EntityKind, COLLECTION_TYPE_ATTRIBUTE, DATA_OBJECT_LEVEL_LABEL};

pub(crate) const STAGING_SUFFIX: &str = "_staging";

pub(crate) const BASE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS object_sequence (
    object_id INTEGER PRIMARY KEY AUTOINCREMENT
);
CREATE TABLE IF NOT EXISTS catalog_user (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_name TEXT NOT NULL UNIQUE,
    is_group INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS group_membership (
    group_id INTEGER NOT NULL REFERENCES catalog_user(user_id),
    user_id INTEGER NOT NULL REFERENCES catalog_user(user_id),
    PRIMARY KEY (group_id, user_id)
);
CREATE TABLE IF NOT EXISTS object_access (
    object_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL REFERENCES catalog_user(user_id),
    PRIMARY KEY (object_id, user_id)
);
CREATE TABLE IF NOT EXISTS collection (
    coll_id INTEGER PRIMARY KEY,
    coll_name TEXT NOT NULL UNIQUE,
    parent_coll_name TEXT,
    coll_owner_name TEXT NOT NULL,
    coll_owner_zone TEXT,
    coll_map_id INTEGER,
    coll_inheritance TEXT,
    coll_comments TEXT,
    coll_info1 TEXT,
    coll_info2 TEXT,
    create_ts INTEGER
);
CREATE TABLE IF NOT EXISTS data_object (
    data_id INTEGER PRIMARY KEY,
    coll_id INTEGER NOT NULL REFERENCES collection(coll_id),
    data_name TEXT NOT NULL,
    data_size INTEGER,
    data_path TEXT,
    data_owner_name TEXT NOT NULL,
    create_ts INTEGER,
    UNIQUE (coll_id, data_name)
);
CREATE TABLE IF NOT EXISTS metadata_attribute (
    meta_id INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id INTEGER NOT NULL,
    meta_attr_name TEXT NOT NULL,
    meta_attr_value TEXT NOT NULL,
    meta_attr_unit TEXT
);
CREATE INDEX IF NOT EXISTS metadata_attribute_object_idx ON metadata_attribute (object_id);
CREATE INDEX IF NOT EXISTS collection_parent_idx ON collection (parent_coll_name);
";

const INDEX_COLUMNS: &str = "object_id INTEGER NOT NULL, \
     object_path TEXT NOT NULL, \
     source_id INTEGER NOT NULL, \
     meta_attr_name TEXT, \
     meta_attr_value TEXT, \
     meta_attr_unit TEXT, \
     level INTEGER NOT NULL, \
     level_label TEXT";

const INSERT_COLUMNS: &str =
    "object_id, object_path, source_id, meta_attr_name, meta_attr_value, meta_attr_unit, level, level_label";

/// Walks every collection up to the root: one row per (collection, ancestor),
/// the collection itself at level 1.
const ANCESTRY_CTE: &str = "ancestry(object_id, object_path, ancestor_id, level) AS ( \
     SELECT coll_id, coll_name, coll_id, 1 FROM collection \
     UNION ALL \
     SELECT ancestry.object_id, ancestry.object_path, parent.coll_id, ancestry.level + 1 \
     FROM ancestry \
     JOIN collection child ON child.coll_id = ancestry.ancestor_id \
     JOIN collection parent ON parent.coll_name = child.parent_coll_name)";

pub(crate) fn staging_table(kind: EntityKind) -> String {
    format!("{}{STAGING_SUFFIX}", kind.index_table())
}

fn create_index_table(table: &str, if_not_exists: bool) -> String {
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    format!("CREATE TABLE {guard}{table} ({INDEX_COLUMNS});")
}

fn create_lookup_indexes(table: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {table}_object_idx ON {table} (object_id);\n\
         CREATE INDEX IF NOT EXISTS {table}_path_idx ON {table} (object_path);\n\
         CREATE INDEX IF NOT EXISTS {table}_attr_idx ON {table} (meta_attr_name, level_label);"
    )
}

/// Level label of the collection `source` (a column expression).
fn label_of(source: &str) -> String {
    format!(
        "(SELECT label.meta_attr_value FROM metadata_attribute label \
         WHERE label.object_id = {source} AND label.meta_attr_name = '{COLLECTION_TYPE_ATTRIBUTE}' \
         ORDER BY label.meta_id LIMIT 1)"
    )
}

/// Published index tables, created empty so searches work before the first refresh.
pub(crate) fn published_schema() -> String {
    [EntityKind::Collection, EntityKind::DataObject]
        .into_iter()
        .map(|kind| {
            let table = kind.index_table();
            format!(
                "{}\n{}",
                create_index_table(table, true),
                create_lookup_indexes(table)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn cleanup_sql() -> String {
    [EntityKind::Collection, EntityKind::DataObject]
        .into_iter()
        .map(|kind| format!("DROP TABLE IF EXISTS {};", staging_table(kind)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain `CREATE TABLE`: leftover staging makes this fail until cleaned up.
pub(crate) fn prepare_sql() -> String {
    let collections = staging_table(EntityKind::Collection);
    let data_objects = staging_table(EntityKind::DataObject);
    let ancestor_label = label_of("ancestry.ancestor_id");

    format!(
        "{create_collections}
WITH RECURSIVE {ANCESTRY_CTE}
INSERT INTO {collections} ({INSERT_COLUMNS})
SELECT ancestry.object_id, ancestry.object_path, ancestry.ancestor_id,
       attr.meta_attr_name, attr.meta_attr_value, attr.meta_attr_unit,
       ancestry.level, {ancestor_label}
FROM ancestry
JOIN metadata_attribute attr ON attr.object_id = ancestry.ancestor_id;

{create_data_objects}
WITH RECURSIVE {ANCESTRY_CTE},
data_paths(data_id, coll_id, object_path) AS (
    SELECT data.data_id, data.coll_id,
           CASE WHEN coll.coll_name = '/' THEN '/' || data.data_name
                ELSE coll.coll_name || '/' || data.data_name END
    FROM data_object data
    JOIN collection coll ON coll.coll_id = data.coll_id)
INSERT INTO {data_objects} ({INSERT_COLUMNS})
SELECT data_paths.data_id, data_paths.object_path, data_paths.data_id,
       attr.meta_attr_name, attr.meta_attr_value, attr.meta_attr_unit,
       1, '{DATA_OBJECT_LEVEL_LABEL}'
FROM data_paths
JOIN metadata_attribute attr ON attr.object_id = data_paths.data_id
UNION ALL
SELECT data_paths.data_id, data_paths.object_path, ancestry.ancestor_id,
       attr.meta_attr_name, attr.meta_attr_value, attr.meta_attr_unit,
       ancestry.level + 1, {ancestor_label}
FROM data_paths
JOIN ancestry ON ancestry.object_id = data_paths.coll_id
JOIN metadata_attribute attr ON attr.object_id = ancestry.ancestor_id;",
        create_collections = create_index_table(&collections, false),
        create_data_objects = create_index_table(&data_objects, false),
    )
}

/// Swap staging into place. Runs inside one transaction.
pub(crate) fn publish_sql() -> String {
    [EntityKind::Collection, EntityKind::DataObject]
        .into_iter()
        .map(|kind| {
            let table = kind.index_table();
            format!(
                "DROP TABLE IF EXISTS {table};\n\
                 ALTER TABLE {staging} RENAME TO {table};\n{indexes}",
                staging = staging_table(kind),
                indexes = create_lookup_indexes(table),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_tables_are_suffixed() {
        assert_eq!(
            staging_table(EntityKind::DataObject),
            "data_object_hierarchy_meta_staging"
        );
    }

    #[test]
    fn cleanup_tolerates_missing_staging() {
        let sql = cleanup_sql();
        assert_eq!(sql.matches("DROP TABLE IF EXISTS").count(), 2);
    }

    #[test]
    fn prepare_refuses_leftover_staging() {
        let sql = prepare_sql();
        assert!(sql.contains("CREATE TABLE collection_hierarchy_meta_staging"));
        assert!(sql.contains("CREATE TABLE data_object_hierarchy_meta_staging"));
        assert!(!sql.contains("IF NOT EXISTS"));
    }

    #[test]
    fn publish_renames_staging_over_published() {
        let sql = publish_sql();
        assert!(sql.contains(
            "ALTER TABLE collection_hierarchy_meta_staging RENAME TO collection_hierarchy_meta"
        ));
        assert!(sql.contains("CREATE INDEX IF NOT EXISTS data_object_hierarchy_meta_path_idx"));
    }
}
