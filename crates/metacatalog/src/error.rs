use thiserror::Error;

use crate::model::EntityKind;
use crate::query::{LevelTargetKind, Operator};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reasons a query is rejected before anything reaches the catalog backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidQuery {
    #[error("compound query contains no sub queries (simple or compound)")]
    EmptyCompoundQuery,

    #[error("compound query depth over the allowed limit of {max}")]
    DepthExceeded { max: usize },

    #[error("unsupported metadata query operator: {0}")]
    UnsupportedOperator(String),

    #[error("unsupported level operator {operator} for a {target} level filter")]
    UnsupportedLevelOperator {
        target: LevelTargetKind,
        operator: Operator,
    },

    #[error("timestamp operator {0} requires a format")]
    MissingFormat(Operator),

    #[error("format provided with non-timestamp operator {0}")]
    UnexpectedFormat(Operator),

    #[error("metadata attribute is required for an exact attribute match")]
    MissingAttribute,

    #[error("metadata attribute '{0}' given with a match-any attribute query")]
    UnexpectedAttribute(String),

    #[error("metadata value is empty for attribute '{0}'")]
    EmptyValue(String),

    #[error("invalid level filter level: {0}")]
    InvalidLevel(u32),

    #[error("level filter label is empty")]
    EmptyLevelLabel,

    #[error("level filter must name exactly one of level or label")]
    AmbiguousLevelFilter,

    #[error("offset and limit must be supplied together")]
    PartialPagination,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] InvalidQuery),

    #[error("catalog backend unavailable: {context}")]
    BackendUnavailable {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("no {kind} at path '{path}'")]
    UnknownPath { kind: EntityKind, path: String },

    #[error("no user or group named '{0}'")]
    UnknownPrincipal(String),

    #[error("'{0}' is not a group")]
    UnknownGroup(String),

    #[error("index refresh already in progress")]
    RefreshConflict,

    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Wrap a store failure, keeping the underlying cause as the error source.
    pub fn backend(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::BackendUnavailable {
            context: context.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
