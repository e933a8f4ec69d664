//! Core value types for the tourgraph property graph.
//!
//! Nodes and edges carry open-ended attribute maps whose values are tagged
//! scalars. Node and edge *types* are declared up front as schema
//! descriptors; loaders hand over plain `NodeRecord`s and a table of
//! `OwnershipMapping`s describing which foreign keys become edges.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Attribute Values ──────────────────────────────────────────────

/// A scalar attribute value.
///
/// Serialized untagged: a JSON number is `Num`, a JSON string is `Str`,
/// and `{"tag": "..."}` is an enumerated `Tag`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttrValue {
    Num(f64),
    Str(String),
    Tag { tag: String },
}

impl AttrValue {
    /// Build an enumerated tag value.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag { tag: tag.into() }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Tag { tag } => Some(tag),
            Self::Num(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Render the value as a node identifier.
    ///
    /// Integral numbers render without a fractional part so that a numeric
    /// foreign key joins against the same id as its string form.
    pub fn as_id(&self) -> String {
        self.to_string()
    }

    /// Type-qualified key used for equality lookups and grouping.
    ///
    /// `Str("5")`, `Tag("5")` and `Num(5.0)` produce distinct keys.
    pub fn key(&self) -> String {
        match self {
            Self::Str(s) => format!("s:{s}"),
            Self::Num(_) => format!("n:{self}"),
            Self::Tag { tag } => format!("t:{tag}"),
        }
    }

    /// Substring containment on string and tag values. Numbers never contain.
    pub fn contains(&self, needle: &str) -> bool {
        self.as_str().is_some_and(|s| s.contains(needle))
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Tag { tag } => write!(f, "{tag}"),
            Self::Num(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Self::Num(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Num(value as f64)
    }
}

/// Attribute name → value, ordered by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Build an `Attributes` map from `(name, value)` pairs.
pub fn attrs<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttrValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// ── Nodes and Edges ───────────────────────────────────────────────

/// Identifier of a node, unique across the whole store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Dense edge identifier: the edge's insertion position in its store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A labeled node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub attributes: Attributes,
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }
}

/// A directed, typed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub edge_type: String,
    pub source: NodeId,
    pub target: NodeId,
    pub attributes: Attributes,
}

/// A loader input row: a label tag plus attributes.
///
/// The node id is the value of the label's unique-key attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub label: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl NodeRecord {
    pub fn new(label: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            label: label.into(),
            attributes,
        }
    }
}

// ── Schema Descriptors ────────────────────────────────────────────

/// Declaration of a node label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeType {
    pub label: String,
    /// Attributes every node of this label must carry.
    #[serde(default)]
    pub required: BTreeSet<String>,
    /// Attribute whose value becomes the node id.
    #[serde(default = "default_unique_key")]
    pub unique_key: String,
    /// Attributes with an equality index.
    #[serde(default)]
    pub indexed: BTreeSet<String>,
}

fn default_unique_key() -> String {
    "id".to_string()
}

impl NodeType {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            required: BTreeSet::new(),
            unique_key: default_unique_key(),
            indexed: BTreeSet::new(),
        }
    }

    pub fn require(mut self, attribute: impl Into<String>) -> Self {
        self.required.insert(attribute.into());
        self
    }

    pub fn unique_key(mut self, attribute: impl Into<String>) -> Self {
        self.unique_key = attribute.into();
        self
    }

    pub fn index(mut self, attribute: impl Into<String>) -> Self {
        self.indexed.insert(attribute.into());
        self
    }
}

/// An allowed `(source label, target label)` pair for an edge type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointPair {
    pub source: String,
    pub target: String,
}

impl EndpointPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Declaration of a directed edge type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeType {
    pub name: String,
    #[serde(default)]
    pub allowed: BTreeSet<EndpointPair>,
    #[serde(default)]
    pub required: BTreeSet<String>,
    /// At most one edge of this type per `(source, target)` pair.
    #[serde(default)]
    pub exclusive: bool,
    /// Traverse this type in both directions regardless of the requested
    /// direction. Off unless configured.
    #[serde(default)]
    pub symmetric: bool,
}

impl EdgeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed: BTreeSet::new(),
            required: BTreeSet::new(),
            exclusive: false,
            symmetric: false,
        }
    }

    pub fn allow(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.allowed.insert(EndpointPair::new(source, target));
        self
    }

    pub fn require(mut self, attribute: impl Into<String>) -> Self {
        self.required.insert(attribute.into());
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn symmetric(mut self) -> Self {
        self.symmetric = true;
        self
    }

    pub fn allows(&self, source_label: &str, target_label: &str) -> bool {
        self.allowed
            .iter()
            .any(|p| p.source == source_label && p.target == target_label)
    }
}

/// Loader rule: every `child_label` node carrying `foreign_key = X` gets
/// exactly one inbound `edge_type` edge from the `owner_label` node with id `X`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnershipMapping {
    pub child_label: String,
    pub foreign_key: String,
    pub edge_type: String,
    pub owner_label: String,
}

impl OwnershipMapping {
    pub fn new(
        child_label: impl Into<String>,
        foreign_key: impl Into<String>,
        edge_type: impl Into<String>,
        owner_label: impl Into<String>,
    ) -> Self {
        Self {
            child_label: child_label.into(),
            foreign_key: foreign_key.into(),
            edge_type: edge_type.into(),
            owner_label: owner_label.into(),
        }
    }
}
