//! Schema registry: declared node labels and edge types.
//!
//! Registration is idempotent per name. Once a registry is handed to a
//! `GraphHandle` it is shared behind an `Arc` and can no longer change.

use std::collections::HashMap;

use tourgraph_core::{Edge, EdgeType, Node, NodeType, OwnershipMapping, SchemaConfig};

use crate::error::{GraphError, Result, Violation};

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    node_types: HashMap<String, NodeType>,
    edge_types: HashMap<String, EdgeType>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration descriptors.
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        let mut registry = Self::new();
        for node_type in &config.node_types {
            registry.register_node_type(node_type.clone())?;
        }
        for edge_type in &config.edge_types {
            registry.register_edge_type(edge_type.clone())?;
        }
        Ok(registry)
    }

    // ── Registration ─────────────────────────────────────────────

    pub fn register_node_type(&mut self, node_type: NodeType) -> Result<()> {
        match self.node_types.get(&node_type.label) {
            Some(existing) if *existing == node_type => Ok(()),
            Some(_) => Err(GraphError::SchemaConflict {
                kind: "node type",
                name: node_type.label,
            }),
            None => {
                tracing::debug!(label = %node_type.label, "Registered node type");
                self.node_types.insert(node_type.label.clone(), node_type);
                Ok(())
            }
        }
    }

    pub fn register_edge_type(&mut self, edge_type: EdgeType) -> Result<()> {
        match self.edge_types.get(&edge_type.name) {
            Some(existing) if *existing == edge_type => Ok(()),
            Some(_) => Err(GraphError::SchemaConflict {
                kind: "edge type",
                name: edge_type.name,
            }),
            None => {
                tracing::debug!(edge_type = %edge_type.name, "Registered edge type");
                self.edge_types.insert(edge_type.name.clone(), edge_type);
                Ok(())
            }
        }
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn node_type(&self, label: &str) -> Option<&NodeType> {
        self.node_types.get(label)
    }

    pub fn edge_type(&self, name: &str) -> Option<&EdgeType> {
        self.edge_types.get(name)
    }

    /// Whether edges of this type are traversed in both directions.
    pub fn is_symmetric(&self, name: &str) -> bool {
        self.edge_types.get(name).is_some_and(|t| t.symmetric)
    }

    /// Registered labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.node_types.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Registered edge type names, sorted.
    pub fn edge_type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.edge_types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ── Validation ───────────────────────────────────────────────

    /// Check a node's label and required attributes, including its unique key.
    pub fn validate_node(&self, node: &Node) -> Result<()> {
        let node_type = self
            .node_type(&node.label)
            .ok_or_else(|| Violation::UnknownLabel {
                label: node.label.clone(),
            })?;

        let missing = std::iter::once(&node_type.unique_key)
            .chain(node_type.required.iter())
            .find(|attr| !node.attributes.contains_key(attr.as_str()));

        if let Some(attribute) = missing {
            return Err(Violation::MissingAttribute {
                owner: format!("{} {}", node.label, node.id),
                attribute: attribute.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Check an edge's type, required attributes, and endpoint labels.
    pub fn validate_edge(&self, edge: &Edge, source_label: &str, target_label: &str) -> Result<()> {
        let edge_type = self.edge_type_or_violation(&edge.edge_type)?;

        if let Some(attribute) = edge_type
            .required
            .iter()
            .find(|attr| !edge.attributes.contains_key(attr.as_str()))
        {
            return Err(Violation::MissingAttribute {
                owner: format!("{} {} -> {}", edge.edge_type, edge.source, edge.target),
                attribute: attribute.clone(),
            }
            .into());
        }

        if !edge_type.allows(source_label, target_label) {
            return Err(Violation::DisallowedEndpoints {
                edge_type: edge.edge_type.clone(),
                source_label: source_label.to_string(),
                target_label: target_label.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Check that an ownership mapping can ever produce a valid edge.
    pub fn validate_mapping(&self, mapping: &OwnershipMapping) -> Result<()> {
        for label in [&mapping.child_label, &mapping.owner_label] {
            if self.node_type(label).is_none() {
                return Err(Violation::UnknownLabel {
                    label: label.clone(),
                }
                .into());
            }
        }

        let edge_type = self.edge_type_or_violation(&mapping.edge_type)?;
        if !edge_type.allows(&mapping.owner_label, &mapping.child_label) {
            return Err(Violation::DisallowedEndpoints {
                edge_type: mapping.edge_type.clone(),
                source_label: mapping.owner_label.clone(),
                target_label: mapping.child_label.clone(),
            }
            .into());
        }
        // Synthesized edges carry no attributes.
        if let Some(attribute) = edge_type.required.iter().next() {
            return Err(Violation::MissingAttribute {
                owner: format!("{} ownership edge", mapping.edge_type),
                attribute: attribute.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn edge_type_or_violation(&self, name: &str) -> std::result::Result<&EdgeType, Violation> {
        self.edge_type(name).ok_or_else(|| Violation::UnknownEdgeType {
            edge_type: name.to_string(),
        })
    }
}
