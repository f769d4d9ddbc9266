//! # Compound Metadata Queries
//!
//! A search is a boolean tree of attribute predicates. Each [`CompoundQuery`]
//! node applies one [`Combinator`] uniformly across its predicates followed by
//! its child nodes; different nodes may use different combinators, and every
//! node is its own explicit group, so there is no precedence to reason about.
//!
//! ```text
//! AND
//! ├── species = Mouse        (level label = Sample)
//! └── OR
//!     ├── size > 100
//!     └── type = bam
//! ```
//!
//! ## Pipeline
//!
//! 1. [`compile::QueryCompiler`] validates the tree and turns it into a
//!    [`compile::CompiledQuery`]: clause text plus positional arguments.
//! 2. [`operators::OperatorCatalog`] supplies the clause for each operator and
//!    level filter of the selected [`EntityKind`](crate::model::EntityKind).
//! 3. [`level::resolve`] picks the effective level filter per predicate.
//! 4. [`access::restrict`] wraps the finished clause with the principal's
//!    access union.
//! 5. [`page::Page`] bounds the result window.
//!
//! Everything here is pure: no I/O, no shared state.
//!
//! ## Wire Format
//!
//! Queries deserialize from camelCase JSON; operators use their upper-case
//! names:
//!
//! ```json
//! {
//!   "combinator": "AND",
//!   "predicates": [
//!     { "attribute": "species", "operator": "EQUAL", "value": "Mouse",
//!       "levelFilter": { "label": "Sample", "operator": "EQUAL" } }
//!   ],
//!   "children": []
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidQuery;

pub mod access;
pub mod compile;
pub mod level;
pub mod operators;
pub mod page;

pub use compile::{CompiledQuery, QueryArg, QueryCompiler};
pub use page::Page;

/// Comparison applied between an attribute row's value and the predicate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Operator {
    Equal,
    NotEqual,
    Like,
    NumLessThan,
    NumLessOrEqual,
    NumGreaterThan,
    NumGreaterOrEqual,
    TimestampLessThan,
    TimestampLessOrEqual,
    TimestampGreaterThan,
    TimestampGreaterOrEqual,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Self::Equal,
        Self::NotEqual,
        Self::Like,
        Self::NumLessThan,
        Self::NumLessOrEqual,
        Self::NumGreaterThan,
        Self::NumGreaterOrEqual,
        Self::TimestampLessThan,
        Self::TimestampLessOrEqual,
        Self::TimestampGreaterThan,
        Self::TimestampGreaterOrEqual,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::Like => "LIKE",
            Self::NumLessThan => "NUM_LESS_THAN",
            Self::NumLessOrEqual => "NUM_LESS_OR_EQUAL",
            Self::NumGreaterThan => "NUM_GREATER_THAN",
            Self::NumGreaterOrEqual => "NUM_GREATER_OR_EQUAL",
            Self::TimestampLessThan => "TIMESTAMP_LESS_THAN",
            Self::TimestampLessOrEqual => "TIMESTAMP_LESS_OR_EQUAL",
            Self::TimestampGreaterThan => "TIMESTAMP_GREATER_THAN",
            Self::TimestampGreaterOrEqual => "TIMESTAMP_GREATER_OR_EQUAL",
        }
    }

    /// Timestamp operators carry a format used to parse both sides.
    pub const fn is_timestamp(self) -> bool {
        matches!(
            self,
            Self::TimestampLessThan
                | Self::TimestampLessOrEqual
                | Self::TimestampGreaterThan
                | Self::TimestampGreaterOrEqual
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = InvalidQuery;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| InvalidQuery::UnsupportedOperator(s.to_string()))
    }
}

impl TryFrom<String> for Operator {
    type Error = InvalidQuery;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a predicate's attribute name is matched against attribute rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeMatch {
    /// The row's attribute name must equal the predicate attribute.
    #[default]
    Exact,
    /// Any attribute row may match; the predicate names no attribute.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub const fn sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Where in the hierarchy a level filter points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LevelTarget {
    Level(u32),
    Label(String),
}

impl LevelTarget {
    pub const fn kind(&self) -> LevelTargetKind {
        match self {
            Self::Level(_) => LevelTargetKind::Level,
            Self::Label(_) => LevelTargetKind::Label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelTargetKind {
    Level,
    Label,
}

impl fmt::Display for LevelTargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level => f.write_str("numeric level"),
            Self::Label => f.write_str("level label"),
        }
    }
}

/// Restricts a predicate to attribute rows recorded at matching levels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLevelFilter", into = "RawLevelFilter")]
pub struct LevelFilter {
    pub target: LevelTarget,
    pub operator: Operator,
}

impl LevelFilter {
    pub fn level(operator: Operator, level: u32) -> Self {
        Self {
            target: LevelTarget::Level(level),
            operator,
        }
    }

    pub fn label(operator: Operator, label: impl Into<String>) -> Self {
        Self {
            target: LevelTarget::Label(label.into()),
            operator,
        }
    }

    /// Check the target value. Operator support is checked by the operator catalog.
    pub fn validate(&self) -> Result<(), InvalidQuery> {
        match &self.target {
            LevelTarget::Level(0) => Err(InvalidQuery::InvalidLevel(0)),
            LevelTarget::Label(label) if label.trim().is_empty() => {
                Err(InvalidQuery::EmptyLevelLabel)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawLevelFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    operator: Operator,
}

impl TryFrom<RawLevelFilter> for LevelFilter {
    type Error = InvalidQuery;

    fn try_from(raw: RawLevelFilter) -> Result<Self, Self::Error> {
        let target = match (raw.level, raw.label) {
            (Some(level), None) => LevelTarget::Level(level),
            (None, Some(label)) => LevelTarget::Label(label),
            _ => return Err(InvalidQuery::AmbiguousLevelFilter),
        };
        Ok(Self {
            target,
            operator: raw.operator,
        })
    }
}

impl From<LevelFilter> for RawLevelFilter {
    fn from(filter: LevelFilter) -> Self {
        let (level, label) = match filter.target {
            LevelTarget::Level(level) => (Some(level), None),
            LevelTarget::Label(label) => (None, Some(label)),
        };
        Self {
            level,
            label,
            operator: filter.operator,
        }
    }
}

/// A single attribute comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPredicate {
    #[serde(default)]
    pub attribute: String,
    pub operator: Operator,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub attribute_match: AttributeMatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_filter: Option<LevelFilter>,
}

impl MetadataPredicate {
    pub fn new(attribute: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
            format: None,
            attribute_match: AttributeMatch::Exact,
            level_filter: None,
        }
    }

    pub fn equal(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(attribute, Operator::Equal, value)
    }

    /// Match `value` against every attribute row regardless of its name.
    pub fn any_attribute(operator: Operator, value: impl Into<String>) -> Self {
        Self {
            attribute_match: AttributeMatch::Any,
            ..Self::new("", operator, value)
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_level_filter(mut self, filter: LevelFilter) -> Self {
        self.level_filter = Some(filter);
        self
    }

    /// Check everything about the predicate that does not depend on the entity kind.
    pub fn validate(&self) -> Result<(), InvalidQuery> {
        match self.attribute_match {
            AttributeMatch::Exact if self.attribute.trim().is_empty() => {
                return Err(InvalidQuery::MissingAttribute);
            }
            AttributeMatch::Any if !self.attribute.is_empty() => {
                return Err(InvalidQuery::UnexpectedAttribute(self.attribute.clone()));
            }
            _ => {}
        }

        if self.value.is_empty() {
            return Err(InvalidQuery::EmptyValue(self.attribute.clone()));
        }

        let has_format = self.format.as_deref().is_some_and(|f| !f.is_empty());
        match (self.operator.is_timestamp(), has_format) {
            (true, false) => Err(InvalidQuery::MissingFormat(self.operator)),
            (false, true) => Err(InvalidQuery::UnexpectedFormat(self.operator)),
            _ => Ok(()),
        }
    }
}

/// A node of the boolean query tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundQuery {
    pub combinator: Combinator,
    #[serde(default)]
    pub predicates: Vec<MetadataPredicate>,
    #[serde(default)]
    pub children: Vec<CompoundQuery>,
}

impl CompoundQuery {
    pub fn new(combinator: Combinator) -> Self {
        Self {
            combinator,
            predicates: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn and() -> Self {
        Self::new(Combinator::And)
    }

    pub fn or() -> Self {
        Self::new(Combinator::Or)
    }

    pub fn with_predicate(mut self, predicate: MetadataPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_child(mut self, child: CompoundQuery) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.children.is_empty()
    }
}

impl From<MetadataPredicate> for CompoundQuery {
    fn from(predicate: MetadataPredicate) -> Self {
        Self::and().with_predicate(predicate)
    }
}
