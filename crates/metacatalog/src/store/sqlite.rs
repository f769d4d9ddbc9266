//! Embedded catalog backend over SQLite.
//!
//! Holds the base catalog tables (collections, data objects, their metadata
//! attributes, users, groups and grants) and the two hierarchy indexes built
//! from them.
//!
//! ## Connections
//!
//! The database runs in WAL mode with two kinds of connection:
//!
//! - one **writer**, behind a mutex, for seeding and the maintenance phases;
//! - a pool of **readers** for searches, checked out per statement.
//!
//! Readers never take the writer lock. Each read sees the last committed
//! snapshot, so a staging build in progress is invisible and the publish
//! transaction is observed all at once or not at all.
//!
//! The seeding methods (`add_*`, `grant_access`) populate a standalone
//! catalog. Index tables only change through [`CatalogBackend`] maintenance
//! phases; newly seeded metadata becomes searchable after the next refresh.

use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use tempfile::TempDir;

use crate::config::SearchConfig;
use crate::error::{CatalogError, Result};
use crate::model::{parent_path, split_path, EntityKind};
use crate::query::QueryArg;

use super::{functions, schema, CatalogBackend, CatalogRow, Statement};

impl ToSql for QueryArg {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            QueryArg::Text(text) => ToSqlOutput::from(text.as_str()),
            QueryArg::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
        })
    }
}

/// A collection to insert. Only `path` and `owner_name` are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCollection {
    pub path: String,
    pub owner_name: String,
    pub owner_zone: Option<String>,
    pub map_id: Option<i64>,
    pub inheritance: Option<String>,
    pub comments: Option<String>,
    pub info1: Option<String>,
    pub info2: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewCollection {
    pub fn new(path: impl Into<String>, owner_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner_name: owner_name.into(),
            ..Self::default()
        }
    }
}

/// A data object to insert under an existing collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDataObject {
    pub path: String,
    pub owner_name: String,
    pub data_size: Option<i64>,
    pub data_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewDataObject {
    pub fn new(path: impl Into<String>, owner_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner_name: owner_name.into(),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, data_size: i64) -> Self {
        self.data_size = Some(data_size);
        self
    }
}

/// Idle reader connections kept for reuse; extra readers close on return.
const MAX_IDLE_READERS: usize = 8;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteBackend {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
    // Declared last: connections close before the directory is removed.
    _scratch: Option<TempDir>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(path.as_ref().to_path_buf(), None)
    }

    /// A private catalog in a temporary directory, removed on drop.
    pub fn open_temporary() -> Result<Self> {
        let dir = TempDir::new()
            .map_err(|e| CatalogError::backend("creating temporary catalog directory", e))?;
        let path = dir.path().join("catalog.db");
        Self::init(path, Some(dir))
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::open(&config.database)
    }

    fn init(path: PathBuf, scratch: Option<TempDir>) -> Result<Self> {
        let conn = connect(&path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| CatalogError::backend("enabling write-ahead log", e))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| CatalogError::backend("setting catalog synchronous mode", e))?;
        conn.execute_batch(schema::BASE_SCHEMA)
            .map_err(|e| CatalogError::backend("creating catalog schema", e))?;
        conn.execute_batch(&schema::published_schema())
            .map_err(|e| CatalogError::backend("creating hierarchy indexes", e))?;
        tracing::debug!(path = %path.display(), "opened catalog writer");
        Ok(Self {
            path,
            writer: Mutex::new(conn),
            readers: Mutex::new(Vec::new()),
            _scratch: scratch,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|e| CatalogError::backend("locking catalog writer", e.to_string()))
    }

    /// Check out a reader, opening a new one when none is idle.
    fn reader(&self) -> Result<PooledReader<'_>> {
        let idle = self
            .readers
            .lock()
            .map_err(|e| CatalogError::backend("locking reader pool", e.to_string()))?
            .pop();
        let conn = match idle {
            Some(conn) => conn,
            None => {
                let conn = connect(&self.path)?;
                conn.pragma_update(None, "query_only", true)
                    .map_err(|e| CatalogError::backend("opening catalog reader", e))?;
                conn
            }
        };
        Ok(PooledReader {
            conn: ManuallyDrop::new(conn),
            pool: &self.readers,
        })
    }

    pub fn add_user(&self, name: &str) -> Result<i64> {
        self.add_principal(name, false)
    }

    pub fn add_group(&self, name: &str) -> Result<i64> {
        self.add_principal(name, true)
    }

    fn add_principal(&self, name: &str, is_group: bool) -> Result<i64> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO catalog_user (user_name, is_group) VALUES (?, ?)",
            params![name, is_group],
        )
        .map_err(|e| CatalogError::backend(format!("adding principal '{name}'"), e))?;
        Ok(conn.last_insert_rowid())
    }

    /// Add `user` to `group`. Adding an existing member is a no-op.
    pub fn add_group_member(&self, group: &str, user: &str) -> Result<()> {
        let conn = self.writer()?;
        let group_id = match find_principal(&conn, group)? {
            Some(Principal { id, is_group: true }) => id,
            Some(_) => return Err(CatalogError::UnknownGroup(group.to_string())),
            None => return Err(CatalogError::UnknownPrincipal(group.to_string())),
        };
        let user_id = require_principal(&conn, user)?;
        conn.execute(
            "INSERT OR IGNORE INTO group_membership (group_id, user_id) VALUES (?, ?)",
            params![group_id, user_id],
        )
        .map_err(|e| CatalogError::backend(format!("adding '{user}' to '{group}'"), e))?;
        Ok(())
    }

    pub fn add_collection(&self, collection: &NewCollection) -> Result<i64> {
        let conn = self.writer()?;
        let context = || format!("adding collection '{}'", collection.path);
        let id = next_object_id(&conn).map_err(|e| CatalogError::backend(context(), e))?;
        conn.execute(
            "INSERT INTO collection (coll_id, coll_name, parent_coll_name, coll_owner_name, \
             coll_owner_zone, coll_map_id, coll_inheritance, coll_comments, coll_info1, \
             coll_info2, create_ts) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                collection.path,
                parent_path(&collection.path),
                collection.owner_name,
                collection.owner_zone,
                collection.map_id,
                collection.inheritance,
                collection.comments,
                collection.info1,
                collection.info2,
                collection.created_at.map(|ts| ts.timestamp()),
            ],
        )
        .map_err(|e| CatalogError::backend(context(), e))?;
        Ok(id)
    }

    pub fn add_data_object(&self, data_object: &NewDataObject) -> Result<i64> {
        let (collection_path, name) = split_path(&data_object.path).ok_or_else(|| {
            CatalogError::UnknownPath {
                kind: EntityKind::DataObject,
                path: data_object.path.clone(),
            }
        })?;
        let conn = self.writer()?;
        let context = || format!("adding data object '{}'", data_object.path);
        let coll_id = resolve_collection(&conn, &collection_path)
            .map_err(|e| CatalogError::backend(context(), e))?
            .ok_or_else(|| CatalogError::UnknownPath {
                kind: EntityKind::Collection,
                path: collection_path.clone(),
            })?;
        let id = next_object_id(&conn).map_err(|e| CatalogError::backend(context(), e))?;
        conn.execute(
            "INSERT INTO data_object (data_id, coll_id, data_name, data_size, data_path, \
             data_owner_name, create_ts) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                coll_id,
                name,
                data_object.data_size,
                data_object.data_path,
                data_object.owner_name,
                data_object.created_at.map(|ts| ts.timestamp()),
            ],
        )
        .map_err(|e| CatalogError::backend(context(), e))?;
        Ok(id)
    }

    /// Attach an attribute row to the entity at `path`.
    pub fn add_metadata(
        &self,
        kind: EntityKind,
        path: &str,
        attribute: &str,
        value: &str,
        unit: Option<&str>,
    ) -> Result<()> {
        let conn = self.writer()?;
        let object_id = require_object(&conn, kind, path)?;
        conn.execute(
            "INSERT INTO metadata_attribute (object_id, meta_attr_name, meta_attr_value, meta_attr_unit) \
             VALUES (?, ?, ?, ?)",
            params![object_id, attribute, value, unit],
        )
        .map_err(|e| CatalogError::backend(format!("adding '{attribute}' to '{path}'"), e))?;
        Ok(())
    }

    /// Grant `principal` (a user or a group) access to the entity at `path`.
    pub fn grant_access(&self, kind: EntityKind, path: &str, principal: &str) -> Result<()> {
        let conn = self.writer()?;
        let object_id = require_object(&conn, kind, path)?;
        let user_id = require_principal(&conn, principal)?;
        conn.execute(
            "INSERT OR IGNORE INTO object_access (object_id, user_id) VALUES (?, ?)",
            params![object_id, user_id],
        )
        .map_err(|e| CatalogError::backend(format!("granting '{principal}' on '{path}'"), e))?;
        tracing::debug!(%kind, path, principal, "granted catalog access");
        Ok(())
    }

    /// Resolve an entity path to its object id.
    pub fn resolve_path(&self, kind: EntityKind, path: &str) -> Result<Option<i64>> {
        let conn = self.reader()?;
        resolve_object(&conn, kind, path)
            .map_err(|e| CatalogError::backend(format!("resolving {kind} '{path}'"), e))
    }
}

impl CatalogBackend for SqliteBackend {
    fn for_each_row(
        &self,
        statement: &Statement,
        visit: &mut dyn FnMut(&dyn CatalogRow) -> Result<()>,
    ) -> Result<()> {
        tracing::debug!(sql = %statement.sql, args = statement.args.len(), "executing catalog query");
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare(&statement.sql)
            .map_err(|e| CatalogError::backend("preparing catalog query", e))?;
        let mut rows = stmt
            .query(params_from_iter(statement.args.iter()))
            .map_err(|e| CatalogError::backend("running catalog query", e))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| CatalogError::backend("reading catalog rows", e))?
        {
            visit(&SqliteRow(row))?;
        }
        Ok(())
    }

    fn query_count(&self, statement: &Statement) -> Result<u64> {
        tracing::debug!(sql = %statement.sql, args = statement.args.len(), "executing catalog count");
        let conn = self.reader()?;
        let count: i64 = conn
            .query_row(
                &statement.sql,
                params_from_iter(statement.args.iter()),
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::backend("running catalog count", e))?;
        u64::try_from(count).map_err(|e| CatalogError::backend("reading catalog count", e))
    }

    fn cleanup_staging(&self) -> Result<()> {
        let conn = self.writer()?;
        conn.execute_batch(&schema::cleanup_sql())
            .map_err(|e| CatalogError::backend("dropping staging indexes", e))
    }

    fn prepare_staging(&self) -> Result<()> {
        let mut conn = self.writer()?;
        let tx = conn
            .transaction()
            .map_err(|e| CatalogError::backend("starting staging build", e))?;
        tx.execute_batch(&schema::prepare_sql())
            .map_err(|e| CatalogError::backend("building staging indexes", e))?;
        tx.commit()
            .map_err(|e| CatalogError::backend("committing staging indexes", e))
    }

    fn publish_staging(&self) -> Result<()> {
        let mut conn = self.writer()?;
        let tx = conn
            .transaction()
            .map_err(|e| CatalogError::backend("starting index publish", e))?;
        tx.execute_batch(&schema::publish_sql())
            .map_err(|e| CatalogError::backend("publishing staging indexes", e))?;
        tx.commit()
            .map_err(|e| CatalogError::backend("committing index publish", e))
    }
}

/// A reader checked out of the pool; returned to it on drop if there is room.
struct PooledReader<'a> {
    conn: ManuallyDrop<Connection>,
    pool: &'a Mutex<Vec<Connection>>,
}

impl Drop for PooledReader<'_> {
    fn drop(&mut self) {
        // SAFETY: `conn` is not accessed again after this.
        let conn = unsafe { ManuallyDrop::take(&mut self.conn) };
        if let Ok(mut idle) = self.pool.lock() {
            if idle.len() < MAX_IDLE_READERS {
                idle.push(conn);
            }
        }
    }
}

impl Deref for PooledReader<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

/// Open a connection with the comparison functions registered.
fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| {
        CatalogError::backend(format!("opening catalog at {}", path.display()), e)
    })?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| CatalogError::backend("setting catalog busy timeout", e))?;
    functions::register(&conn)
        .map_err(|e| CatalogError::backend("registering comparison functions", e))?;
    Ok(conn)
}

struct SqliteRow<'r, 's>(&'r Row<'s>);

impl CatalogRow for SqliteRow<'_, '_> {
    fn text(&self, idx: usize) -> Result<Option<String>> {
        self.0
            .get(idx)
            .map_err(|e| CatalogError::backend(format!("reading text column {idx}"), e))
    }

    fn integer(&self, idx: usize) -> Result<Option<i64>> {
        self.0
            .get(idx)
            .map_err(|e| CatalogError::backend(format!("reading integer column {idx}"), e))
    }
}

fn next_object_id(conn: &Connection) -> rusqlite::Result<i64> {
    conn.execute("INSERT INTO object_sequence DEFAULT VALUES", [])?;
    Ok(conn.last_insert_rowid())
}

fn resolve_collection(conn: &Connection, path: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT coll_id FROM collection WHERE coll_name = ?",
        [path],
        |row| row.get(0),
    )
    .optional()
}

fn resolve_object(conn: &Connection, kind: EntityKind, path: &str) -> rusqlite::Result<Option<i64>> {
    match kind {
        EntityKind::Collection => resolve_collection(conn, path),
        EntityKind::DataObject => {
            let Some((collection_path, name)) = split_path(path) else {
                return Ok(None);
            };
            conn.query_row(
                "SELECT data.data_id FROM data_object data \
                 JOIN collection coll ON coll.coll_id = data.coll_id \
                 WHERE coll.coll_name = ? AND data.data_name = ?",
                params![collection_path, name],
                |row| row.get(0),
            )
            .optional()
        }
    }
}

fn require_object(conn: &Connection, kind: EntityKind, path: &str) -> Result<i64> {
    resolve_object(conn, kind, path)
        .map_err(|e| CatalogError::backend(format!("resolving {kind} '{path}'"), e))?
        .ok_or_else(|| CatalogError::UnknownPath {
            kind,
            path: path.to_string(),
        })
}

struct Principal {
    id: i64,
    is_group: bool,
}

fn find_principal(conn: &Connection, name: &str) -> Result<Option<Principal>> {
    conn.query_row(
        "SELECT user_id, is_group FROM catalog_user WHERE user_name = ?",
        [name],
        |row| {
            Ok(Principal {
                id: row.get(0)?,
                is_group: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(|e| CatalogError::backend(format!("resolving principal '{name}'"), e))
}

fn require_principal(conn: &Connection, name: &str) -> Result<i64> {
    find_principal(conn, name)?
        .map(|principal| principal.id)
        .ok_or_else(|| CatalogError::UnknownPrincipal(name.to_string()))
}
