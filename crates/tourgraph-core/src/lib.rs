//! tourgraph-core: Shared types, configuration, and error handling for tourgraph.
//!
//! This crate provides the foundational types used across all tourgraph components:
//! - Tagged scalar attribute values and attribute maps
//! - Nodes, edges, and loader input records
//! - Node/edge type descriptors and ownership mappings (the schema vocabulary)
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{QueryLimits, SchemaConfig, TourgraphConfig};
pub use error::TourgraphError;
pub use types::{
    attrs, AttrValue, Attributes, Edge, EdgeId, EdgeType, EndpointPair, Node, NodeId, NodeRecord,
    NodeType, OwnershipMapping,
};
