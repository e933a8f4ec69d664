//! Declarative query patterns.
//!
//! A `PatternSpec` names a start filter, an optional bounded traversal,
//! an optional aggregation, and the shape of the emitted rows. Patterns are
//! plain serde values, so they can be built in code or parsed from JSON:
//!
//! ```json
//! {
//!   "start": {"label": "Region", "predicate": {"attribute": "id", "equals": "tibet"}},
//!   "traversal": {
//!     "edge_types": ["HAS_SUBREGION", "HAS_ATTRACTION"],
//!     "max_hops": 2,
//!     "end": {"label": "Attraction"}
//!   },
//!   "aggregate": {"group_by": "label", "reducer": "count"}
//! }
//! ```

use serde::{Deserialize, Serialize};

use tourgraph_core::{AttrValue, Node, QueryLimits};
use tourgraph_graph::SchemaRegistry;

use crate::error::{QueryError, Result};
use crate::row::PATH_COLUMNS;
use crate::traversal::Direction;

/// A complete query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub start: NodeFilter,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traversal: Option<Traversal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Projected columns. Defaults depend on what the query yields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

/// Nodes of one label, optionally narrowed by a predicate on one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFilter {
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub attribute: String,

    #[serde(flatten)]
    pub op: Match,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Match {
    /// Same type and value.
    Equals(AttrValue),
    /// Substring of a string or tag value.
    Contains(String),
}

/// Bounded multi-hop expansion from each start node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traversal {
    /// Edge types that may be followed. Must not be empty.
    pub edge_types: Vec<String>,

    #[serde(default)]
    pub direction: Direction,

    #[serde(default = "default_min_hops")]
    pub min_hops: usize,

    pub max_hops: usize,

    /// Filter on the last node of each path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NodeFilter>,
}

fn default_min_hops() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub group_by: GroupKey,

    #[serde(default)]
    pub reducer: Reducer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Label,
    /// Type of the edge that reached the item (last edge of a path).
    EdgeType,
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    #[default]
    Count,
    /// Collect one field per item, in input order, duplicates kept.
    CollectOrdered(String),
}

impl Reducer {
    /// Output column holding the reduced value.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::CollectOrdered(_) => "values",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,

    #[serde(default)]
    pub descending: bool,
}

// ── Builders ──────────────────────────────────────────────────────

impl PatternSpec {
    /// Match nodes of `label`.
    pub fn nodes(label: impl Into<String>) -> Self {
        Self {
            start: NodeFilter::new(label),
            traversal: None,
            aggregate: None,
            sort: None,
            limit: None,
            columns: None,
        }
    }

    /// Parse a JSON pattern. Malformed input is a syntax error.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| QueryError::syntax(e.to_string()))
    }

    pub fn matching(mut self, predicate: Predicate) -> Self {
        self.start.predicate = Some(predicate);
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = Some(traversal);
        self
    }

    pub fn group_by(mut self, group_by: GroupKey, reducer: Reducer) -> Self {
        self.aggregate = Some(Aggregation { group_by, reducer });
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.sort = Some(SortKey {
            column: column.into(),
            descending,
        });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

impl NodeFilter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            predicate: None,
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        node.label == self.label && self.predicate.as_ref().map_or(true, |p| p.matches(node))
    }
}

impl Predicate {
    pub fn equals(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            attribute: attribute.into(),
            op: Match::Equals(value.into()),
        }
    }

    pub fn contains(attribute: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            op: Match::Contains(needle.into()),
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        let Some(value) = node.attr(&self.attribute) else {
            return false;
        };
        match &self.op {
            Match::Equals(expected) => value.key() == expected.key(),
            Match::Contains(needle) => value.contains(needle),
        }
    }
}

impl Traversal {
    pub fn new<I, S>(edge_types: I, max_hops: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            edge_types: edge_types.into_iter().map(Into::into).collect(),
            direction: Direction::default(),
            min_hops: default_min_hops(),
            max_hops,
            end: None,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn min_hops(mut self, min_hops: usize) -> Self {
        self.min_hops = min_hops;
        self
    }

    pub fn ending_at(mut self, end: NodeFilter) -> Self {
        self.end = Some(end);
        self
    }
}

// ── Validation ────────────────────────────────────────────────────

impl PatternSpec {
    /// Reject patterns that cannot be evaluated against `schema`.
    pub fn validate(&self, schema: &SchemaRegistry, limits: &QueryLimits) -> Result<()> {
        validate_filter(&self.start, "start", schema)?;

        if let Some(traversal) = &self.traversal {
            validate_traversal(traversal, schema, limits)?;
        }

        if let Some(columns) = &self.columns {
            if self.aggregate.is_some() {
                return Err(QueryError::syntax(
                    "columns cannot be projected from an aggregate",
                ));
            }
            if columns.is_empty() {
                return Err(QueryError::syntax("column list is empty"));
            }
            if columns.iter().any(String::is_empty) {
                return Err(QueryError::syntax("empty column name"));
            }
        }

        if let Some(aggregation) = &self.aggregate {
            match &aggregation.group_by {
                GroupKey::Attribute(name) if name.is_empty() => {
                    return Err(QueryError::syntax("group_by attribute name is empty"));
                }
                GroupKey::EdgeType if self.traversal.is_none() => {
                    return Err(QueryError::syntax(
                        "group_by edge_type requires a traversal",
                    ));
                }
                _ => {}
            }
            if matches!(&aggregation.reducer, Reducer::CollectOrdered(f) if f.is_empty()) {
                return Err(QueryError::syntax("collect_ordered field name is empty"));
            }
        }

        if let Some(sort) = &self.sort {
            self.validate_sort_column(&sort.column)?;
        }
        Ok(())
    }

    fn validate_sort_column(&self, column: &str) -> Result<()> {
        if column.is_empty() {
            return Err(QueryError::syntax("sort column is empty"));
        }
        let known: Option<Vec<&str>> = match (&self.aggregate, &self.columns) {
            (Some(aggregation), _) => Some(vec!["key", aggregation.reducer.column()]),
            (None, Some(columns)) => Some(columns.iter().map(String::as_str).collect()),
            (None, None) if self.traversal.is_some() => Some(PATH_COLUMNS.to_vec()),
            // Node rows carry open-ended attribute columns.
            (None, None) => None,
        };
        match known {
            Some(known) if !known.contains(&column) => Err(QueryError::syntax(format!(
                "unknown sort column {column} (expected one of {})",
                known.join(", ")
            ))),
            _ => Ok(()),
        }
    }
}

pub(crate) fn validate_filter(filter: &NodeFilter, role: &str, schema: &SchemaRegistry) -> Result<()> {
    if filter.label.is_empty() {
        return Err(QueryError::syntax(format!("{role} label is empty")));
    }
    if schema.node_type(&filter.label).is_none() {
        return Err(QueryError::syntax(format!(
            "unknown {role} label {}",
            filter.label
        )));
    }
    if filter
        .predicate
        .as_ref()
        .is_some_and(|p| p.attribute.is_empty())
    {
        return Err(QueryError::syntax(format!(
            "{role} predicate attribute name is empty"
        )));
    }
    Ok(())
}

fn validate_traversal(
    traversal: &Traversal,
    schema: &SchemaRegistry,
    limits: &QueryLimits,
) -> Result<()> {
    if traversal.edge_types.is_empty() {
        return Err(QueryError::syntax("traversal edge type list is empty"));
    }
    if let Some(unknown) = traversal
        .edge_types
        .iter()
        .find(|t| schema.edge_type(t).is_none())
    {
        return Err(QueryError::syntax(format!("unknown edge type {unknown}")));
    }
    if traversal.max_hops == 0 {
        return Err(QueryError::syntax("max_hops must be at least 1"));
    }
    if traversal.max_hops > limits.max_hops_ceiling {
        return Err(QueryError::syntax(format!(
            "max_hops {} exceeds the ceiling of {}",
            traversal.max_hops, limits.max_hops_ceiling
        )));
    }
    if traversal.min_hops > traversal.max_hops {
        return Err(QueryError::syntax(format!(
            "min_hops {} is greater than max_hops {}",
            traversal.min_hops, traversal.max_hops
        )));
    }
    if let Some(end) = &traversal.end {
        validate_filter(end, "end", schema)?;
    }
    Ok(())
}
