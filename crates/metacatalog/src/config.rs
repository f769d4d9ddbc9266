//! # Configuration
//!
//! Search configuration is a [`confique`] struct loaded in layers.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `METACATALOG_DATABASE`, `METACATALOG_MAX_QUERY_DEPTH`,
//!    `METACATALOG_DEFAULT_PAGE_LIMIT`.
//! 2. **Explicit file**: the TOML path handed to [`SearchConfig::load`].
//! 3. **Global file**: `metacatalog.toml` in the OS config directory (via `directories`).
//! 4. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! Missing files are skipped.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `database` | `metacatalog.db` | SQLite catalog file |
//! | `max_query_depth` | `10` | Deepest compound query nesting accepted |
//! | `default_page_limit` | unset | Page size applied when a caller gives neither offset nor limit |

use std::path::{Path, PathBuf};

use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::query::QueryCompiler;

pub const CONFIG_FILE_NAME: &str = "metacatalog.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Path of the embedded SQLite catalog.
    #[config(default = "metacatalog.db", env = "METACATALOG_DATABASE")]
    pub database: PathBuf,

    /// Deepest compound query nesting accepted, counting the root node.
    #[config(default = 10, env = "METACATALOG_MAX_QUERY_DEPTH")]
    pub max_query_depth: usize,

    /// Page size used when a search supplies neither offset nor limit.
    #[config(env = "METACATALOG_DEFAULT_PAGE_LIMIT")]
    pub default_page_limit: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("metacatalog.db"),
            max_query_depth: QueryCompiler::DEFAULT_MAX_DEPTH,
            default_page_limit: None,
        }
    }
}

impl SearchConfig {
    /// Load env, then `path` (if given), then the global file, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        if let Some(global) = Self::global_config_path() {
            builder = builder.file(global);
        }
        let config = builder
            .load()
            .map_err(|e| CatalogError::Config(e.to_string()))?;
        tracing::debug!(database = %config.database.display(), "loaded search configuration");
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "metacatalog", "metacatalog")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn compiler(&self) -> QueryCompiler {
        QueryCompiler::new(self.max_query_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.database, PathBuf::from("metacatalog.db"));
        assert_eq!(config.max_query_depth, 10);
        assert_eq!(config.default_page_limit, None);
        assert_eq!(config.compiler().max_depth(), 10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "database = \"/var/lib/catalog.db\"\nmax_query_depth = 4\ndefault_page_limit = 50\n",
        )
        .unwrap();

        let config = SearchConfig::builder().file(&path).load().unwrap();
        assert_eq!(config.database, PathBuf::from("/var/lib/catalog.db"));
        assert_eq!(config.max_query_depth, 4);
        assert_eq!(config.default_page_limit, Some(50));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = SearchConfig::builder()
            .file(dir.path().join("absent.toml"))
            .load()
            .unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_query_depth = \"deep\"\n").unwrap();

        let err = SearchConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }
}
