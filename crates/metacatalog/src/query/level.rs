//! Level filter resolution.
//!
//! A predicate's own level filter wins; otherwise the caller-supplied default
//! applies; otherwise the predicate matches attribute rows at any level.

use super::{LevelFilter, MetadataPredicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilterSource {
    Predicate,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLevelFilter<'a> {
    pub filter: &'a LevelFilter,
    pub source: LevelFilterSource,
}

pub fn resolve<'a>(
    predicate: &'a MetadataPredicate,
    default_filter: Option<&'a LevelFilter>,
) -> Option<ResolvedLevelFilter<'a>> {
    if let Some(filter) = predicate.level_filter.as_ref() {
        return Some(ResolvedLevelFilter {
            filter,
            source: LevelFilterSource::Predicate,
        });
    }
    default_filter.map(|filter| ResolvedLevelFilter {
        filter,
        source: LevelFilterSource::Default,
    })
}
