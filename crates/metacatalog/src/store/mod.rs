//! # Catalog Store
//!
//! The search core never touches a database driver directly. It talks to a
//! [`CatalogBackend`], which runs parameterized statements against the
//! hierarchy indexes and drives the three index maintenance phases.
//!
//! ## Index Tables
//!
//! Each entity kind has one published index, holding one row per
//! (entity, inherited attribute) pair:
//!
//! ```text
//! object_id | object_path | source_id | meta_attr_name | meta_attr_value | meta_attr_unit | level | level_label
//! ```
//!
//! `source_id` is the entity (the object itself or an ancestor collection)
//! that owns the attribute.
//!
//! ## Row Decoding
//!
//! Backends expose each result row through [`CatalogRow`], a column-index
//! accessor independent of any driver's row type. Typed results implement
//! [`FromCatalogRow`] against it.
//!
//! ## Maintenance
//!
//! Index rebuilds go through staging tables:
//! 1. **cleanup**: drop staging left behind by an interrupted run.
//! 2. **prepare**: build fresh staging from the base tables.
//! 3. **publish**: swap staging in as the published index, atomically.
//!
//! Each phase commits on its own. A failure after cleanup leaves the published
//! index untouched; the next run's cleanup removes whatever staging remains.
//!
//! ## Implementations
//!
//! - [`sqlite::SqliteBackend`]: embedded catalog over `rusqlite`.

use crate::error::Result;
use crate::query::QueryArg;

mod functions;
mod schema;
pub mod sqlite;

/// A statement with positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<QueryArg>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<QueryArg>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Column access on one result row, by zero-based index.
pub trait CatalogRow {
    fn text(&self, idx: usize) -> Result<Option<String>>;

    fn integer(&self, idx: usize) -> Result<Option<i64>>;

    /// A text column that must not be null.
    fn required_text(&self, idx: usize, column: &str) -> Result<String> {
        self.text(idx)?.ok_or_else(|| missing_column(column))
    }

    /// An integer column that must not be null.
    fn required_integer(&self, idx: usize, column: &str) -> Result<i64> {
        self.integer(idx)?.ok_or_else(|| missing_column(column))
    }
}

fn missing_column(column: &str) -> crate::error::CatalogError {
    crate::error::CatalogError::backend(
        "decoding catalog row",
        format!("column '{column}' is null"),
    )
}

pub trait FromCatalogRow: Sized {
    fn from_row(row: &dyn CatalogRow) -> Result<Self>;
}

impl FromCatalogRow for String {
    fn from_row(row: &dyn CatalogRow) -> Result<Self> {
        row.required_text(0, "value")
    }
}

/// Raw access to the hierarchy indexes.
///
/// Implementations must be safe to share between threads: reads may run
/// concurrently with each other and with maintenance phases.
pub trait CatalogBackend: Send + Sync {
    /// Run a read statement, handing each row to `visit` in result order.
    fn for_each_row(
        &self,
        statement: &Statement,
        visit: &mut dyn FnMut(&dyn CatalogRow) -> Result<()>,
    ) -> Result<()>;

    /// Run a statement returning a single integer (e.g. a count).
    fn query_count(&self, statement: &Statement) -> Result<u64>;

    /// Drop leftover staging state. Must succeed when there is none.
    fn cleanup_staging(&self) -> Result<()>;

    /// Build staging structures from the base tables.
    fn prepare_staging(&self) -> Result<()>;

    /// Atomically replace the published indexes with staging.
    fn publish_staging(&self) -> Result<()>;
}

/// Run `statement` and decode every row as `T`.
pub fn query_rows<T, B>(backend: &B, statement: &Statement) -> Result<Vec<T>>
where
    T: FromCatalogRow,
    B: CatalogBackend + ?Sized,
{
    let mut rows = Vec::new();
    backend.for_each_row(statement, &mut |row| {
        rows.push(T::from_row(row)?);
        Ok(())
    })?;
    Ok(rows)
}
