//! # API Facade
//!
//! [`MetadataSearch`] is the single entry point the calling business layer
//! uses. Each search method runs the same pipeline:
//!
//! 1. **Compile** the [`CompoundQuery`] for the entity kind, applying the
//!    caller's default level filter to predicates without their own.
//! 2. **Scope** data object searches to paths containing `path_scope`.
//! 3. **Restrict** to the principal's access union, as the outermost conjunct.
//! 4. **Execute** through the [`Executor`].
//!
//! Query validation failures surface before the backend is touched.
//!
//! ## Generic Over CatalogBackend
//!
//! `MetadataSearch<B: CatalogBackend>`:
//! - Embedded: `MetadataSearch<SqliteBackend>` (see [`MetadataSearch::open`])
//! - Testing: any fake implementing [`CatalogBackend`]
//!
//! ## Pagination
//!
//! [`SearchOptions::page`] sets offset and limit together. When a caller sets
//! neither and the configuration has a `default_page_limit`, the first page of
//! that size is returned. Counts are never paginated.

use crate::attributes::attributes_by_level;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::maintenance::{MaintenancePhase, ViewMaintenance};
use crate::model::{DetailedEntry, EntityKind, LevelAttributes, MetadataEntry};
use crate::query::access;
use crate::query::{CompiledQuery, CompoundQuery, LevelFilter, QueryCompiler};
use crate::store::sqlite::SqliteBackend;
use crate::store::CatalogBackend;

/// Per-call search parameters shared by every search method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions<'a> {
    /// `None` searches unrestricted (administrative calls).
    pub principal: Option<&'a str>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub default_level_filter: Option<&'a LevelFilter>,
}

impl<'a> SearchOptions<'a> {
    pub fn for_principal(principal: &'a str) -> Self {
        Self {
            principal: Some(principal),
            ..Self::default()
        }
    }

    pub fn page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub fn with_default_level_filter(mut self, filter: &'a LevelFilter) -> Self {
        self.default_level_filter = Some(filter);
        self
    }
}

pub struct MetadataSearch<B: CatalogBackend> {
    backend: B,
    compiler: QueryCompiler,
    default_page_limit: Option<u32>,
    maintenance: ViewMaintenance,
}

impl MetadataSearch<SqliteBackend> {
    /// Open the embedded catalog named by `config`.
    pub fn open(config: &SearchConfig) -> Result<Self> {
        let backend = SqliteBackend::from_config(config)?;
        tracing::info!(database = %config.database.display(), "opened metadata catalog");
        Ok(Self::with_config(backend, config))
    }
}

impl<B: CatalogBackend> MetadataSearch<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &SearchConfig::default())
    }

    pub fn with_config(backend: B, config: &SearchConfig) -> Self {
        Self {
            backend,
            compiler: config.compiler(),
            default_page_limit: config.default_page_limit,
            maintenance: ViewMaintenance::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn maintenance_phase(&self) -> MaintenancePhase {
        self.maintenance.phase()
    }

    // --- Collections ---

    pub fn collection_paths(
        &self,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<Vec<String>> {
        let compiled = self.prepare(EntityKind::Collection, None, query, options)?;
        let (offset, limit) = self.window(options);
        self.executor().paths(&compiled, offset, limit)
    }

    pub fn detailed_collection_paths(
        &self,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<Vec<DetailedEntry>> {
        let compiled = self.prepare(EntityKind::Collection, None, query, options)?;
        let (offset, limit) = self.window(options);
        self.executor().detailed_paths(&compiled, offset, limit)
    }

    pub fn collection_count(&self, query: &CompoundQuery, options: &SearchOptions<'_>) -> Result<u64> {
        let compiled = self.prepare(EntityKind::Collection, None, query, options)?;
        self.executor().count(&compiled)
    }

    // --- Data objects ---

    /// `path_scope` keeps only paths containing it as a substring.
    pub fn data_object_paths(
        &self,
        path_scope: Option<&str>,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<Vec<String>> {
        let compiled = self.prepare(EntityKind::DataObject, path_scope, query, options)?;
        let (offset, limit) = self.window(options);
        self.executor().paths(&compiled, offset, limit)
    }

    pub fn detailed_data_object_paths(
        &self,
        path_scope: Option<&str>,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<Vec<DetailedEntry>> {
        let compiled = self.prepare(EntityKind::DataObject, path_scope, query, options)?;
        let (offset, limit) = self.window(options);
        self.executor().detailed_paths(&compiled, offset, limit)
    }

    pub fn data_object_count(
        &self,
        path_scope: Option<&str>,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<u64> {
        let compiled = self.prepare(EntityKind::DataObject, path_scope, query, options)?;
        self.executor().count(&compiled)
    }

    /// Collections directly holding a matching data object, in the order
    /// first seen. Offset and limit page the data objects, not the parents.
    pub fn data_object_parent_paths(
        &self,
        path_scope: Option<&str>,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<Vec<String>> {
        let compiled = self.prepare(EntityKind::DataObject, path_scope, query, options)?;
        let (offset, limit) = self.window(options);
        self.executor().parent_paths(&compiled, offset, limit)
    }

    pub fn detailed_data_object_parent_paths(
        &self,
        path_scope: Option<&str>,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<Vec<DetailedEntry>> {
        let compiled = self.prepare(EntityKind::DataObject, path_scope, query, options)?;
        let (offset, limit) = self.window(options);
        self.executor().detailed_parent_paths(&compiled, offset, limit)
    }

    // --- Metadata ---

    pub fn collection_metadata(&self, path: &str, min_level: u32) -> Result<Vec<MetadataEntry>> {
        self.executor()
            .metadata_at_level(EntityKind::Collection, path, min_level)
    }

    pub fn data_object_metadata(&self, path: &str, min_level: u32) -> Result<Vec<MetadataEntry>> {
        self.executor()
            .metadata_at_level(EntityKind::DataObject, path, min_level)
    }

    /// The collection's own attributes from the live catalog, empty when
    /// `principal` cannot see it.
    pub fn collection_own_metadata(
        &self,
        path: &str,
        principal: Option<&str>,
    ) -> Result<Vec<MetadataEntry>> {
        self.executor()
            .own_metadata(EntityKind::Collection, path, principal)
    }

    pub fn data_object_own_metadata(
        &self,
        path: &str,
        principal: Option<&str>,
    ) -> Result<Vec<MetadataEntry>> {
        self.executor()
            .own_metadata(EntityKind::DataObject, path, principal)
    }

    pub fn collection_metadata_attributes(
        &self,
        level_label: Option<&str>,
        principal: Option<&str>,
    ) -> Result<Vec<LevelAttributes>> {
        attributes_by_level(&self.backend, EntityKind::Collection, level_label, principal)
    }

    pub fn data_object_metadata_attributes(
        &self,
        level_label: Option<&str>,
        principal: Option<&str>,
    ) -> Result<Vec<LevelAttributes>> {
        attributes_by_level(&self.backend, EntityKind::DataObject, level_label, principal)
    }

    // --- Maintenance ---

    /// Rebuild and publish both hierarchy indexes.
    pub fn refresh_index(&self) -> Result<()> {
        self.maintenance.refresh(&self.backend)
    }

    fn executor(&self) -> Executor<'_, B> {
        Executor::new(&self.backend)
    }

    fn prepare(
        &self,
        kind: EntityKind,
        path_scope: Option<&str>,
        query: &CompoundQuery,
        options: &SearchOptions<'_>,
    ) -> Result<CompiledQuery> {
        let mut compiled = self
            .compiler
            .compile(query, kind, options.default_level_filter)?;
        if let Some(scope) = path_scope.filter(|s| !s.is_empty()) {
            compiled = compiled.within_path(scope);
        }
        Ok(access::restrict(compiled, options.principal))
    }

    fn window(&self, options: &SearchOptions<'_>) -> (Option<u32>, Option<u32>) {
        match (options.offset, options.limit, self.default_page_limit) {
            (None, None, Some(limit)) => (Some(0), Some(limit)),
            (offset, limit, _) => (offset, limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, InvalidQuery};
    use crate::query::MetadataPredicate;

    fn search() -> MetadataSearch<SqliteBackend> {
        MetadataSearch::new(SqliteBackend::open_temporary().unwrap())
    }

    #[test]
    fn empty_catalog_yields_no_results() {
        let search = search();
        let query = CompoundQuery::from(MetadataPredicate::equal("type", "fastq"));

        assert!(search
            .data_object_paths(None, &query, &SearchOptions::default())
            .unwrap()
            .is_empty());
        assert_eq!(
            search
                .collection_count(&query, &SearchOptions::for_principal("bob"))
                .unwrap(),
            0
        );
        assert!(search
            .detailed_collection_paths(&query, &SearchOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn invalid_query_is_reported_before_execution() {
        let err = search()
            .collection_paths(&CompoundQuery::or(), &SearchOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidQuery(InvalidQuery::EmptyCompoundQuery)
        ));
    }

    #[test]
    fn configured_depth_limit_applies() {
        let config = SearchConfig {
            max_query_depth: 1,
            ..SearchConfig::default()
        };
        let search = MetadataSearch::with_config(SqliteBackend::open_temporary().unwrap(), &config);
        let query = CompoundQuery::and()
            .with_predicate(MetadataPredicate::equal("a", "1"))
            .with_child(CompoundQuery::from(MetadataPredicate::equal("b", "2")));

        let err = search
            .collection_paths(&query, &SearchOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidQuery(InvalidQuery::DepthExceeded { max: 1 })
        ));
    }

    #[test]
    fn default_page_limit_only_when_unpaginated() {
        let config = SearchConfig {
            default_page_limit: Some(25),
            ..SearchConfig::default()
        };
        let search = MetadataSearch::with_config(SqliteBackend::open_temporary().unwrap(), &config);

        assert_eq!(search.window(&SearchOptions::default()), (Some(0), Some(25)));
        assert_eq!(
            search.window(&SearchOptions::default().page(5, 10)),
            (Some(5), Some(10))
        );
        let partial = SearchOptions {
            offset: Some(5),
            ..SearchOptions::default()
        };
        assert_eq!(search.window(&partial), (Some(5), None));
    }

    #[test]
    fn refresh_on_empty_catalog_succeeds() {
        let search = search();
        search.refresh_index().unwrap();
        search.refresh_index().unwrap();
        assert_eq!(search.maintenance_phase(), MaintenancePhase::Idle);
    }
}
