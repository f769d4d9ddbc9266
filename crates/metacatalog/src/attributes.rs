//! Attribute name discovery per level label.
//!
//! Answers "which attributes exist at the Sample level?" for the entities a
//! principal can see, using the same access union as searches.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{EntityKind, LevelAttributes};
use crate::query::access::{access_args, ACCESSIBLE_OBJECTS_SQL};
use crate::query::QueryArg;
use crate::store::{query_rows, CatalogBackend, CatalogRow, FromCatalogRow, Statement};

struct LabeledAttribute {
    level_label: Option<String>,
    attribute: String,
}

impl FromCatalogRow for LabeledAttribute {
    fn from_row(row: &dyn CatalogRow) -> Result<Self> {
        Ok(Self {
            level_label: row.text(0)?,
            attribute: row.required_text(1, "meta_attr_name")?,
        })
    }
}

/// Distinct attribute names grouped by level label, in label order.
///
/// A blank `level_label` is treated as no filter. Rows without a label form
/// their own group (`level_label: None`), ordered first.
pub fn attributes_by_level<B: CatalogBackend + ?Sized>(
    backend: &B,
    kind: EntityKind,
    level_label: Option<&str>,
    principal: Option<&str>,
) -> Result<Vec<LevelAttributes>> {
    let statement = attributes_statement(kind, level_label, principal);
    let rows: Vec<LabeledAttribute> = query_rows(backend, &statement)?;

    let mut groups: Vec<LevelAttributes> = Vec::new();
    for row in rows {
        match groups.last_mut() {
            Some(group) if group.level_label == row.level_label => {
                group.attributes.insert(row.attribute);
            }
            _ => groups.push(LevelAttributes {
                level_label: row.level_label,
                attributes: BTreeSet::from([row.attribute]),
            }),
        }
    }
    tracing::debug!(%kind, labels = groups.len(), "aggregated attributes by level");
    Ok(groups)
}

fn attributes_statement(
    kind: EntityKind,
    level_label: Option<&str>,
    principal: Option<&str>,
) -> Statement {
    let mut sql = format!(
        "SELECT meta.level_label, meta.meta_attr_name FROM {} meta \
         WHERE meta.meta_attr_name IS NOT NULL AND meta.meta_attr_name <> ''",
        kind.index_table()
    );
    let mut args = Vec::new();

    if let Some(label) = level_label.filter(|l| !l.trim().is_empty()) {
        sql.push_str(" AND meta.level_label = ?");
        args.push(QueryArg::from(label));
    }
    if let Some(principal) = principal {
        sql.push_str(&format!(" AND meta.object_id IN ({ACCESSIBLE_OBJECTS_SQL})"));
        args.extend(access_args(principal));
    }

    sql.push_str(
        " GROUP BY meta.level_label, meta.meta_attr_name \
         ORDER BY meta.level_label, meta.meta_attr_name",
    );
    Statement::new(sql, args)
}
