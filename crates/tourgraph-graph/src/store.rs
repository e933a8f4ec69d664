//! In-memory property graph with adjacency indices.
//!
//! Nodes and edges live in dense vectors; `outgoing[i]` / `incoming[i]` hold
//! the edge indices touching node `i` in insertion order. Label scans and
//! declared attribute indices also preserve insertion order, so every read
//! is deterministic.
//!
//! Mutation is crate-private: only an open `Transaction` can reach it, and
//! committed stores are shared read-only behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use tourgraph_core::{
    AttrValue, Attributes, Edge, EdgeId, Node, NodeId, OwnershipMapping,
};

use crate::error::{GraphError, Result, Violation};
use crate::schema::SchemaRegistry;

/// `(label, attribute)` → value key → node indices.
type AttributeIndex = HashMap<(String, String), HashMap<String, Vec<usize>>>;

#[derive(Debug, Clone)]
pub struct GraphStore {
    schema: Arc<SchemaRegistry>,
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    /// `(source index, target index)` per edge.
    endpoints: Vec<(usize, usize)>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    by_label: HashMap<String, Vec<usize>>,
    attribute_index: AttributeIndex,
    ownership: Vec<OwnershipMapping>,
}

impl GraphStore {
    pub(crate) fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            endpoints: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            by_label: HashMap::new(),
            attribute_index: HashMap::new(),
            ownership: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    // ── Mutation ─────────────────────────────────────────────────

    /// Insert a node whose id is the value of its label's unique key.
    pub(crate) fn create_node(&mut self, label: &str, attributes: Attributes) -> Result<NodeId> {
        let node_type = self
            .schema
            .node_type(label)
            .ok_or_else(|| Violation::UnknownLabel {
                label: label.to_string(),
            })?;

        let id = attributes
            .get(&node_type.unique_key)
            .map(AttrValue::as_id)
            .ok_or_else(|| Violation::MissingAttribute {
                owner: format!("{label} record"),
                attribute: node_type.unique_key.clone(),
            })?;

        let node = Node {
            id: NodeId(id),
            label: label.to_string(),
            attributes,
        };
        self.schema.validate_node(&node)?;

        if self.node_index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNodeId { id: node.id });
        }

        let index = self.nodes.len();
        for attribute in &node_type.indexed {
            if let Some(value) = node.attributes.get(attribute) {
                self.attribute_index
                    .entry((node.label.clone(), attribute.clone()))
                    .or_default()
                    .entry(value.key())
                    .or_default()
                    .push(index);
            }
        }
        self.by_label
            .entry(node.label.clone())
            .or_default()
            .push(index);
        self.node_index.insert(node.id.clone(), index);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());

        let id = node.id.clone();
        self.nodes.push(node);
        Ok(id)
    }

    /// Append a directed edge to both adjacency indices.
    pub(crate) fn create_edge(
        &mut self,
        edge_type: &str,
        source: &NodeId,
        target: &NodeId,
        attributes: Attributes,
    ) -> Result<EdgeId> {
        let src = self.require_endpoint(edge_type, source)?;
        let tgt = self.require_endpoint(edge_type, target)?;

        let edge = Edge {
            id: EdgeId(self.edges.len()),
            edge_type: edge_type.to_string(),
            source: source.clone(),
            target: target.clone(),
            attributes,
        };
        self.schema
            .validate_edge(&edge, &self.nodes[src].label, &self.nodes[tgt].label)?;

        let exclusive = self
            .schema
            .edge_type(edge_type)
            .is_some_and(|t| t.exclusive);
        if exclusive && self.edges_between(source, target, edge_type).next().is_some() {
            return Err(GraphError::DuplicateEdge {
                edge_type: edge_type.to_string(),
                source_id: source.clone(),
                target_id: target.clone(),
            });
        }

        let index = edge.id.0;
        self.outgoing[src].push(index);
        self.incoming[tgt].push(index);
        self.endpoints.push((src, tgt));
        self.edges.push(edge);
        Ok(EdgeId(index))
    }

    /// Set a non-key attribute, keeping declared indices in step.
    pub(crate) fn set_attribute(&mut self, id: &NodeId, attribute: &str, value: AttrValue) -> Result<()> {
        let index = self
            .index_of(id)
            .ok_or_else(|| GraphError::NodeNotFound { id: id.clone() })?;
        let label = self.nodes[index].label.clone();
        let node_type = self
            .schema
            .node_type(&label)
            .ok_or_else(|| Violation::UnknownLabel {
                label: label.clone(),
            })?;

        if node_type.unique_key == attribute {
            return Err(GraphError::ImmutableAttribute {
                id: id.clone(),
                attribute: attribute.to_string(),
            });
        }

        if node_type.indexed.contains(attribute) {
            let slot = self
                .attribute_index
                .entry((label, attribute.to_string()))
                .or_default();
            if let Some(old) = self.nodes[index].attributes.get(attribute) {
                if let Some(bucket) = slot.get_mut(&old.key()) {
                    bucket.retain(|&i| i != index);
                }
            }
            let bucket = slot.entry(value.key()).or_default();
            // Buckets stay in insertion order.
            let pos = bucket.partition_point(|&i| i < index);
            bucket.insert(pos, index);
        }

        self.nodes[index]
            .attributes
            .insert(attribute.to_string(), value);
        Ok(())
    }

    pub(crate) fn record_ownership(&mut self, mapping: &OwnershipMapping) {
        if !self.ownership.contains(mapping) {
            self.ownership.push(mapping.clone());
        }
    }

    fn require_endpoint(&self, edge_type: &str, id: &NodeId) -> Result<usize> {
        self.index_of(id).ok_or_else(|| GraphError::DanglingReference {
            edge_type: edge_type.to_string(),
            missing: id.clone(),
        })
    }

    // ── Node Reads ───────────────────────────────────────────────

    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    /// Nodes of a label in insertion order. The scan is lazy; clone it or
    /// call again to restart.
    pub fn nodes_by_label(&self, label: &str) -> LabelScan<'_> {
        let indices = self.by_label.get(label).map(Vec::as_slice).unwrap_or(&[]);
        LabelScan {
            store: self,
            indices: indices.iter(),
        }
    }

    /// Nodes of a label whose attribute equals `value`, in insertion order.
    ///
    /// Uses the attribute index when the label declares one, otherwise scans.
    pub fn find_by_attribute(&self, label: &str, attribute: &str, value: &AttrValue) -> Vec<&Node> {
        let key = value.key();
        match self
            .attribute_index
            .get(&(label.to_string(), attribute.to_string()))
        {
            Some(index) => index
                .get(&key)
                .map(|bucket| bucket.iter().map(|&i| &self.nodes[i]).collect())
                .unwrap_or_default(),
            None if self.is_indexed(label, attribute) => Vec::new(),
            None => self
                .nodes_by_label(label)
                .filter(|n| n.attr(attribute).is_some_and(|v| v.key() == key))
                .collect(),
        }
    }

    /// Whether `label` declares an index on `attribute`.
    pub fn is_indexed(&self, label: &str, attribute: &str) -> bool {
        self.schema
            .node_type(label)
            .is_some_and(|t| t.indexed.contains(attribute))
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ── Edge Reads ───────────────────────────────────────────────

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> std::slice::Iter<'_, Edge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Outgoing edges of a node in insertion order (empty for unknown ids).
    pub fn outgoing(&self, id: &NodeId) -> impl Iterator<Item = &Edge> + Clone + '_ {
        let indices = self.index_of(id).map(|i| self.out_edges(i)).unwrap_or(&[]);
        indices.iter().map(move |&e| &self.edges[e])
    }

    /// Incoming edges of a node in insertion order (empty for unknown ids).
    pub fn incoming(&self, id: &NodeId) -> impl Iterator<Item = &Edge> + Clone + '_ {
        let indices = self.index_of(id).map(|i| self.in_edges(i)).unwrap_or(&[]);
        indices.iter().map(move |&e| &self.edges[e])
    }

    /// Edges of one type from `source` to `target`.
    pub fn edges_between<'a>(
        &'a self,
        source: &NodeId,
        target: &'a NodeId,
        edge_type: &'a str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.outgoing(source)
            .filter(move |e| e.edge_type == edge_type && e.target == *target)
    }

    /// Mappings whose invariant this store upholds.
    pub fn ownership_mappings(&self) -> &[OwnershipMapping] {
        &self.ownership
    }

    // ── Dense Index Access ───────────────────────────────────────
    //
    // Traversal code works on dense indices. Indices come from this store
    // and panic when out of range, like slice indexing.

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    pub fn node_at(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn edge_at(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    /// `(source index, target index)` of an edge.
    pub fn endpoints_at(&self, edge_index: usize) -> (usize, usize) {
        self.endpoints[edge_index]
    }

    pub fn out_edges(&self, index: usize) -> &[usize] {
        &self.outgoing[index]
    }

    pub fn in_edges(&self, index: usize) -> &[usize] {
        &self.incoming[index]
    }
}

/// Lazy, restartable scan over one label's nodes.
#[derive(Debug, Clone)]
pub struct LabelScan<'a> {
    store: &'a GraphStore,
    indices: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for LabelScan<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        self.indices.next().map(|&i| &self.store.nodes[i])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl ExactSizeIterator for LabelScan<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use tourgraph_core::{attrs, EdgeType, NodeType};

    fn store() -> GraphStore {
        let mut schema = SchemaRegistry::new();
        schema
            .register_node_type(NodeType::new("City").require("name"))
            .unwrap();
        schema
            .register_node_type(
                NodeType::new("Attraction")
                    .require("name")
                    .index("city_id"),
            )
            .unwrap();
        schema
            .register_node_type(NodeType::new("Food").unique_key("code"))
            .unwrap();
        schema
            .register_edge_type(
                EdgeType::new("HAS_ATTRACTION")
                    .allow("City", "Attraction")
                    .exclusive(),
            )
            .unwrap();
        schema
            .register_edge_type(EdgeType::new("NEARBY").allow("Attraction", "Attraction"))
            .unwrap();
        GraphStore::new(Arc::new(schema))
    }

    fn city(store: &mut GraphStore, id: &str) -> NodeId {
        store
            .create_node("City", attrs([("id", id), ("name", id)]))
            .unwrap()
    }

    fn attraction(store: &mut GraphStore, id: &str, city_id: &str) -> NodeId {
        store
            .create_node(
                "Attraction",
                attrs([("id", id), ("name", id), ("city_id", city_id)]),
            )
            .unwrap()
    }

    #[test]
    fn test_create_node_uses_unique_key_as_id() {
        let mut store = store();
        let id = store
            .create_node("Food", attrs([("code", "peking_duck")]))
            .unwrap();
        assert_eq!(id, NodeId::from("peking_duck"));
        assert_eq!(store.get_node(&id).unwrap().label, "Food");
    }

    #[test]
    fn test_duplicate_id_rejected_across_labels() {
        let mut store = store();
        city(&mut store, "beijing");

        let err = store
            .create_node("Food", attrs([("code", "beijing")]))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNodeId { ref id } if id.as_str() == "beijing"));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_nodes_by_label_insertion_order_and_restartable() {
        let mut store = store();
        for id in ["beijing", "nanjing", "shanghai"] {
            city(&mut store, id);
        }
        attraction(&mut store, "bj_gugong", "beijing");

        let scan = store.nodes_by_label("City");
        assert_eq!(scan.len(), 3);
        let first: Vec<&str> = scan.clone().map(|n| n.id.as_str()).collect();
        let second: Vec<&str> = scan.map(|n| n.id.as_str()).collect();
        assert_eq!(first, vec!["beijing", "nanjing", "shanghai"]);
        assert_eq!(first, second);
        assert_eq!(store.nodes_by_label("Hotel").count(), 0);
    }

    #[test]
    fn test_create_edge_dangling_reference() {
        let mut store = store();
        let beijing = city(&mut store, "beijing");

        let err = store
            .create_edge(
                "HAS_ATTRACTION",
                &beijing,
                &NodeId::from("bj_gugong"),
                Attributes::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::DanglingReference { ref missing, .. } if missing.as_str() == "bj_gugong"
        ));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_create_edge_disallowed_pair() {
        let mut store = store();
        let beijing = city(&mut store, "beijing");
        let gugong = attraction(&mut store, "bj_gugong", "beijing");

        let err = store
            .create_edge("HAS_ATTRACTION", &gugong, &beijing, Attributes::new())
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::SchemaViolation(Violation::DisallowedEndpoints { .. })
        ));
    }

    #[test]
    fn test_exclusive_edge_rejects_duplicate() {
        let mut store = store();
        let beijing = city(&mut store, "beijing");
        let gugong = attraction(&mut store, "bj_gugong", "beijing");

        store
            .create_edge("HAS_ATTRACTION", &beijing, &gugong, Attributes::new())
            .unwrap();
        let err = store
            .create_edge("HAS_ATTRACTION", &beijing, &gugong, Attributes::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateEdge { .. }));
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_parallel_edges_allowed_when_not_exclusive() {
        let mut store = store();
        city(&mut store, "beijing");
        let a = attraction(&mut store, "bj_gugong", "beijing");
        let b = attraction(&mut store, "bj_jingshan", "beijing");

        store.create_edge("NEARBY", &a, &b, Attributes::new()).unwrap();
        store.create_edge("NEARBY", &a, &b, Attributes::new()).unwrap();
        store.create_edge("NEARBY", &b, &a, Attributes::new()).unwrap();

        assert_eq!(store.outgoing(&a).count(), 2);
        assert_eq!(store.incoming(&a).count(), 1);
        assert_eq!(store.edges_between(&a, &b, "NEARBY").count(), 2);
        let targets: Vec<&str> = store.outgoing(&b).map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["bj_gugong"]);
    }

    #[test]
    fn test_find_by_attribute_indexed_and_scanned_agree() {
        let mut store = store();
        city(&mut store, "beijing");
        city(&mut store, "nanjing");
        attraction(&mut store, "bj_gugong", "beijing");
        attraction(&mut store, "nj_zhongshan", "nanjing");
        attraction(&mut store, "bj_tiantan", "beijing");

        assert!(store.is_indexed("Attraction", "city_id"));
        let indexed: Vec<&str> = store
            .find_by_attribute("Attraction", "city_id", &AttrValue::from("beijing"))
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        let scanned: Vec<&str> = store
            .nodes_by_label("Attraction")
            .filter(|n| n.attr("city_id") == Some(&AttrValue::from("beijing")))
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(indexed, vec!["bj_gugong", "bj_tiantan"]);
        assert_eq!(indexed, scanned);

        let by_name = store.find_by_attribute("City", "name", &AttrValue::from("nanjing"));
        assert_eq!(by_name.len(), 1);
        assert!(store
            .find_by_attribute("City", "name", &AttrValue::tag("nanjing"))
            .is_empty());
    }

    #[test]
    fn test_set_attribute_keeps_index_in_step() {
        let mut store = store();
        city(&mut store, "beijing");
        city(&mut store, "nanjing");
        let a = attraction(&mut store, "a", "beijing");
        attraction(&mut store, "b", "nanjing");
        attraction(&mut store, "c", "nanjing");

        store
            .set_attribute(&a, "city_id", AttrValue::from("nanjing"))
            .unwrap();

        assert!(store
            .find_by_attribute("Attraction", "city_id", &AttrValue::from("beijing"))
            .is_empty());
        let ids: Vec<&str> = store
            .find_by_attribute("Attraction", "city_id", &AttrValue::from("nanjing"))
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_set_attribute_rejects_unique_key() {
        let mut store = store();
        let beijing = city(&mut store, "beijing");
        let err = store
            .set_attribute(&beijing, "id", AttrValue::from("peking"))
            .unwrap_err();
        assert!(matches!(err, GraphError::ImmutableAttribute { .. }));

        let err = store
            .set_attribute(&NodeId::from("nowhere"), "name", AttrValue::from("x"))
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound { .. }));
    }
}
