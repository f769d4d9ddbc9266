//! Compound query compilation.
//!
//! A [`CompoundQuery`] tree compiles bottom-up into a single clause over the
//! entity alias plus the positional arguments its placeholders bind to:
//!
//! - each predicate becomes one existence clause (see [`super::operators`]);
//! - each child node compiles recursively into its own group;
//! - the node's items (predicates first, then children, in order) are joined
//!   with the node's combinator inside one pair of parentheses.
//!
//! A node holding a single item compiles to that item unwrapped. Arguments are
//! appended in traversal order, so `args[i]` binds the `i`-th `?` in the
//! clause text. Each predicate is validated completely before any of its
//! arguments are appended.

use crate::error::InvalidQuery;
use crate::model::EntityKind;

use super::level;
use super::operators::{OperatorCatalog, ENTITY_ALIAS};
use super::{AttributeMatch, Combinator, CompoundQuery, LevelFilter, LevelTarget, MetadataPredicate};

/// A positional argument bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryArg {
    Text(String),
    Integer(i64),
}

impl From<&str> for QueryArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryArg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for QueryArg {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Clause text over the `entity` alias of one kind's index, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    kind: EntityKind,
    clause: String,
    args: Vec<QueryArg>,
}

impl CompiledQuery {
    pub(crate) fn from_parts(kind: EntityKind, clause: String, args: Vec<QueryArg>) -> Self {
        Self { kind, clause, args }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn args(&self) -> &[QueryArg] {
        &self.args
    }

    /// Restrict matches to entity paths containing `scope` as a substring.
    pub fn within_path(self, scope: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(QueryArg::Text(format!("%{}%", escape_like(scope))));
        args.extend(self.args);
        Self {
            kind: self.kind,
            clause: format!(
                "{ENTITY_ALIAS}.object_path LIKE ? ESCAPE '\\' AND ({})",
                self.clause
            ),
            args,
        }
    }
}

/// Escape `LIKE` wildcards so `value` matches literally under `ESCAPE '\'`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug)]
struct Fragment {
    sql: String,
    args: Vec<QueryArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCompiler {
    max_depth: usize,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DEPTH)
    }
}

impl QueryCompiler {
    /// Deepest allowed nesting, counting the root node as depth 1.
    pub const DEFAULT_MAX_DEPTH: usize = 10;

    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn compile(
        &self,
        query: &CompoundQuery,
        kind: EntityKind,
        default_level_filter: Option<&LevelFilter>,
    ) -> Result<CompiledQuery, InvalidQuery> {
        let catalog = OperatorCatalog::for_kind(kind);
        let fragment = self.compile_node(query, &catalog, default_level_filter, 1)?;
        tracing::debug!(
            kind = %kind,
            args = fragment.args.len(),
            "compiled compound metadata query"
        );
        Ok(CompiledQuery::from_parts(kind, fragment.sql, fragment.args))
    }

    fn compile_node(
        &self,
        node: &CompoundQuery,
        catalog: &OperatorCatalog,
        default_level_filter: Option<&LevelFilter>,
        depth: usize,
    ) -> Result<Fragment, InvalidQuery> {
        if depth > self.max_depth {
            return Err(InvalidQuery::DepthExceeded {
                max: self.max_depth,
            });
        }
        if node.is_empty() {
            return Err(InvalidQuery::EmptyCompoundQuery);
        }

        let mut items = Vec::with_capacity(node.predicates.len() + node.children.len());
        for predicate in &node.predicates {
            items.push(compile_predicate(predicate, catalog, default_level_filter)?);
        }
        for child in &node.children {
            items.push(self.compile_node(child, catalog, default_level_filter, depth + 1)?);
        }

        Ok(join(items, node.combinator))
    }
}

fn compile_predicate(
    predicate: &MetadataPredicate,
    catalog: &OperatorCatalog,
    default_level_filter: Option<&LevelFilter>,
) -> Result<Fragment, InvalidQuery> {
    predicate.validate()?;
    let value_clause = catalog.clause_for(predicate.operator);

    let level_clause = match level::resolve(predicate, default_level_filter) {
        Some(resolved) => {
            let filter = resolved.filter;
            filter.validate()?;
            let template = catalog.level_clause_for(&filter.target, filter.operator)?;
            let arg = match &filter.target {
                LevelTarget::Level(level) => QueryArg::Integer(i64::from(*level)),
                LevelTarget::Label(label) => QueryArg::Text(label.clone()),
            };
            Some((template, arg))
        }
        None => None,
    };

    let mut sql = catalog.existence_prefix();
    let mut args = Vec::with_capacity(4);

    sql.push_str(" AND ");
    sql.push_str(value_clause.sql());
    args.push(QueryArg::Text(predicate.value.clone()));
    if value_clause.binds() == 2 {
        if let Some(format) = &predicate.format {
            args.push(QueryArg::Text(format.clone()));
        }
    }

    if predicate.attribute_match == AttributeMatch::Exact {
        let attribute_clause = catalog.exact_attribute_clause();
        sql.push_str(" AND ");
        sql.push_str(attribute_clause.sql());
        args.push(QueryArg::Text(predicate.attribute.clone()));
    }

    if let Some((template, arg)) = level_clause {
        sql.push_str(" AND ");
        sql.push_str(template.sql());
        args.push(arg);
    }

    sql.push(')');
    Ok(Fragment { sql, args })
}

fn join(mut items: Vec<Fragment>, combinator: Combinator) -> Fragment {
    if items.len() == 1 {
        if let Some(single) = items.pop() {
            return single;
        }
    }

    let separator = format!(" {} ", combinator.sql());
    let mut sql = String::from("(");
    let mut args = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            sql.push_str(&separator);
        }
        sql.push_str(&item.sql);
        args.extend(item.args);
    }
    sql.push(')');
    Fragment { sql, args }
}
