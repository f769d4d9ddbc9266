//! # metacatalog
//!
//! Compound metadata search over a hierarchical catalog of collections and
//! data objects. Callers describe a boolean tree of attribute predicates; the
//! library compiles it into one parameterized, access-restricted query over a
//! materialized hierarchy index and returns matching paths, detailed records
//! or counts.
//!
//! ## Architecture
//!
//! ```text
//! api::MetadataSearch
//!   ├── query      compile CompoundQuery -> CompiledQuery (pure)
//!   │     ├── operators   clause per operator / level filter
//!   │     ├── level       effective level filter per predicate
//!   │     └── access      principal access union
//!   ├── executor   paths, counts, detailed rows, parent collections
//!   ├── attributes attribute names per level label
//!   ├── maintenance  cleanup -> prepare -> publish, single-flighted
//!   └── store      CatalogBackend trait + embedded SQLite catalog (WAL,
//!                  one writer, pooled readers)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use metacatalog::{
//!     CompoundQuery, LevelFilter, MetadataPredicate, MetadataSearch, Operator, SearchConfig,
//!     SearchOptions,
//! };
//!
//! let search = MetadataSearch::open(&SearchConfig::load(None)?)?;
//! search.refresh_index()?;
//!
//! let query = CompoundQuery::and()
//!     .with_predicate(
//!         MetadataPredicate::equal("species", "Mouse")
//!             .with_level_filter(LevelFilter::label(Operator::Equal, "Sample")),
//!     )
//!     .with_predicate(MetadataPredicate::new("size", Operator::NumGreaterThan, "100"));
//!
//! let paths = search.data_object_paths(
//!     Some("/Archive"),
//!     &query,
//!     &SearchOptions::for_principal("alice").page(0, 50),
//! )?;
//! # Ok::<(), metacatalog::CatalogError>(())
//! ```

pub mod api;
pub mod attributes;
pub mod config;
pub mod error;
pub mod executor;
pub mod maintenance;
pub mod model;
pub mod query;
pub mod store;

pub use api::{MetadataSearch, SearchOptions};
pub use config::SearchConfig;
pub use error::{CatalogError, InvalidQuery, Result};
pub use maintenance::{MaintenancePhase, ViewMaintenance};
pub use model::{
    CollectionRecord, DataObjectRecord, DetailedEntry, EntityKind, EntityRecord, LevelAttributes,
    MetadataEntry,
};
pub use query::{
    AttributeMatch, Combinator, CompiledQuery, CompoundQuery, LevelFilter, LevelTarget,
    MetadataPredicate, Operator, Page, QueryArg, QueryCompiler,
};
pub use store::sqlite::{NewCollection, NewDataObject, SqliteBackend};
pub use store::{CatalogBackend, CatalogRow, FromCatalogRow, Statement};
