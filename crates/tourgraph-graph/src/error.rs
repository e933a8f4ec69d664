//! Error types for the tourgraph-graph crate.

use thiserror::Error;

use tourgraph_core::NodeId;

/// What a schema check rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("unknown node label {label}")]
    UnknownLabel { label: String },

    #[error("unknown edge type {edge_type}")]
    UnknownEdgeType { edge_type: String },

    #[error("{owner} is missing required attribute {attribute}")]
    MissingAttribute { owner: String, attribute: String },

    #[error("{edge_type} does not allow {source_label} -> {target_label}")]
    DisallowedEndpoints {
        edge_type: String,
        source_label: String,
        target_label: String,
    },
}

/// Errors from schema registration, store mutation, and loading.
///
/// Any of these raised inside a transaction aborts it; the committed store
/// is left untouched.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Schema violation: {0}")]
    SchemaViolation(#[from] Violation),

    #[error("Schema conflict: {kind} {name} is already registered with a different definition")]
    SchemaConflict { kind: &'static str, name: String },

    #[error("Duplicate node id: {id}")]
    DuplicateNodeId { id: NodeId },

    #[error("Duplicate edge: exclusive {edge_type} already links {source_id} -> {target_id}")]
    DuplicateEdge {
        edge_type: String,
        source_id: NodeId,
        target_id: NodeId,
    },

    #[error("Dangling reference: {edge_type} edge endpoint {missing} does not exist")]
    DanglingReference { edge_type: String, missing: NodeId },

    #[error(
        "Referential integrity error: {child_id}.{foreign_key} references missing {owner_label} {owner_id}"
    )]
    ReferentialIntegrity {
        child_id: NodeId,
        foreign_key: String,
        owner_label: String,
        owner_id: String,
    },

    #[error(
        "Ownership conflict: {child_id} has {found} inbound {edge_type} edges from {expected_owner}, expected exactly one"
    )]
    OwnershipConflict {
        child_id: NodeId,
        edge_type: String,
        expected_owner: String,
        found: usize,
    },

    #[error("Ownership conflict: {child_id} has an inbound {edge_type} edge from {source_id}, which no mapping names")]
    UnmappedOwner {
        child_id: NodeId,
        edge_type: String,
        source_id: NodeId,
    },

    #[error("Attribute {attribute} of node {id} cannot be changed in this transaction")]
    ImmutableAttribute { id: NodeId, attribute: String },

    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    #[error("Another load transaction is in progress")]
    TransactionInProgress,

    #[error("Record source error: {source}")]
    Source {
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, GraphError>;
