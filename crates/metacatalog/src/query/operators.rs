//! Operator catalog: the clause each operator compiles to, per entity kind.
//!
//! Every predicate becomes a correlated existence check against the kind's
//! hierarchy index:
//!
//! ```text
//! EXISTS (SELECT 1 FROM <index> meta
//!         WHERE meta.object_id = entity.object_id
//!           AND <value clause> [AND <attribute clause>] [AND <level clause>])
//! ```
//!
//! `entity` is the alias of the outer scan over the same index. All values are
//! bound as parameters; templates only ever contain `?` placeholders.

use crate::error::InvalidQuery;
use crate::model::EntityKind;

use super::{LevelTarget, Operator};

/// Alias of the outer index scan that existence clauses correlate with.
pub const ENTITY_ALIAS: &str = "entity";

/// A clause fragment with positional placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseTemplate {
    sql: &'static str,
    binds: usize,
}

impl ClauseTemplate {
    const fn new(sql: &'static str, binds: usize) -> Self {
        Self { sql, binds }
    }

    pub const fn sql(&self) -> &'static str {
        self.sql
    }

    /// Number of `?` placeholders the caller must bind, in order.
    pub const fn binds(&self) -> usize {
        self.binds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorCatalog {
    kind: EntityKind,
}

impl OperatorCatalog {
    pub const fn for_kind(kind: EntityKind) -> Self {
        Self { kind }
    }

    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    pub const fn table(&self) -> &'static str {
        self.kind.index_table()
    }

    /// Value clause for `op`. Timestamp clauses bind the value and then the format.
    pub const fn clause_for(&self, op: Operator) -> ClauseTemplate {
        match op {
            Operator::Equal => ClauseTemplate::new("meta.meta_attr_value = ?", 1),
            Operator::NotEqual => ClauseTemplate::new("meta.meta_attr_value <> ?", 1),
            Operator::Like => ClauseTemplate::new("lower(meta.meta_attr_value) LIKE lower(?)", 1),
            Operator::NumLessThan => {
                ClauseTemplate::new("num_less_than(meta.meta_attr_value, ?) = 1", 1)
            }
            Operator::NumLessOrEqual => {
                ClauseTemplate::new("num_less_or_equal(meta.meta_attr_value, ?) = 1", 1)
            }
            Operator::NumGreaterThan => {
                ClauseTemplate::new("num_greater_than(meta.meta_attr_value, ?) = 1", 1)
            }
            Operator::NumGreaterOrEqual => {
                ClauseTemplate::new("num_greater_or_equal(meta.meta_attr_value, ?) = 1", 1)
            }
            Operator::TimestampLessThan => {
                ClauseTemplate::new("timestamp_less_than(meta.meta_attr_value, ?, ?) = 1", 2)
            }
            Operator::TimestampLessOrEqual => {
                ClauseTemplate::new("timestamp_less_or_equal(meta.meta_attr_value, ?, ?) = 1", 2)
            }
            Operator::TimestampGreaterThan => {
                ClauseTemplate::new("timestamp_greater_than(meta.meta_attr_value, ?, ?) = 1", 2)
            }
            Operator::TimestampGreaterOrEqual => ClauseTemplate::new(
                "timestamp_greater_or_equal(meta.meta_attr_value, ?, ?) = 1",
                2,
            ),
        }
    }

    /// Level clause for a filter target. Numeric levels take the equality and
    /// numeric orderings; labels take equality and `LIKE`.
    pub fn level_clause_for(
        &self,
        target: &LevelTarget,
        op: Operator,
    ) -> Result<ClauseTemplate, InvalidQuery> {
        let sql = match (target, op) {
            (LevelTarget::Level(_), Operator::Equal) => "meta.level = ?",
            (LevelTarget::Level(_), Operator::NotEqual) => "meta.level <> ?",
            (LevelTarget::Level(_), Operator::NumLessThan) => "meta.level < ?",
            (LevelTarget::Level(_), Operator::NumLessOrEqual) => "meta.level <= ?",
            (LevelTarget::Level(_), Operator::NumGreaterThan) => "meta.level > ?",
            (LevelTarget::Level(_), Operator::NumGreaterOrEqual) => "meta.level >= ?",
            (LevelTarget::Label(_), Operator::Equal) => "meta.level_label = ?",
            (LevelTarget::Label(_), Operator::NotEqual) => "meta.level_label <> ?",
            (LevelTarget::Label(_), Operator::Like) => "meta.level_label LIKE ?",
            (target, operator) => {
                return Err(InvalidQuery::UnsupportedLevelOperator {
                    target: target.kind(),
                    operator,
                })
            }
        };
        Ok(ClauseTemplate::new(sql, 1))
    }

    pub const fn exact_attribute_clause(&self) -> ClauseTemplate {
        ClauseTemplate::new("meta.meta_attr_name = ?", 1)
    }

    /// Opening of the existence check; the caller appends conditions and `)`.
    pub fn existence_prefix(&self) -> String {
        format!(
            "EXISTS (SELECT 1 FROM {} meta WHERE meta.object_id = {ENTITY_ALIAS}.object_id",
            self.table()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::LevelTargetKind;

    #[test]
    fn every_operator_has_a_value_clause_for_both_kinds() {
        for kind in [EntityKind::Collection, EntityKind::DataObject] {
            let catalog = OperatorCatalog::for_kind(kind);
            for op in Operator::ALL {
                let template = catalog.clause_for(op);
                assert_eq!(template.sql().matches('?').count(), template.binds());
                let expected = if op.is_timestamp() { 2 } else { 1 };
                assert_eq!(template.binds(), expected, "{op}");
            }
        }
    }

    #[test]
    fn numeric_level_accepts_orderings_only() {
        let catalog = OperatorCatalog::for_kind(EntityKind::DataObject);
        let target = LevelTarget::Level(2);
        for op in [
            Operator::Equal,
            Operator::NotEqual,
            Operator::NumLessThan,
            Operator::NumLessOrEqual,
            Operator::NumGreaterThan,
            Operator::NumGreaterOrEqual,
        ] {
            assert!(catalog.level_clause_for(&target, op).is_ok(), "{op}");
        }
        assert_eq!(
            catalog.level_clause_for(&target, Operator::Like),
            Err(InvalidQuery::UnsupportedLevelOperator {
                target: LevelTargetKind::Level,
                operator: Operator::Like,
            })
        );
    }

    #[test]
    fn label_accepts_equality_and_like() {
        let catalog = OperatorCatalog::for_kind(EntityKind::Collection);
        let target = LevelTarget::Label("Sample".into());
        assert!(catalog.level_clause_for(&target, Operator::Equal).is_ok());
        assert!(catalog.level_clause_for(&target, Operator::NotEqual).is_ok());
        assert!(catalog.level_clause_for(&target, Operator::Like).is_ok());
        assert!(catalog
            .level_clause_for(&target, Operator::NumGreaterThan)
            .is_err());
        assert!(catalog
            .level_clause_for(&target, Operator::TimestampLessThan)
            .is_err());
    }

    #[test]
    fn existence_prefix_targets_kind_index() {
        let prefix = OperatorCatalog::for_kind(EntityKind::Collection).existence_prefix();
        assert!(prefix.contains("FROM collection_hierarchy_meta meta"));
        assert!(prefix.ends_with("meta.object_id = entity.object_id"));
    }
}
