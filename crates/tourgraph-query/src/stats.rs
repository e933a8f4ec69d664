//! Snapshot statistics: label and edge-type frequencies, best-connected nodes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tourgraph_core::NodeId;
use tourgraph_graph::GraphStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Most frequent first; ties by label.
    pub nodes_by_label: Vec<LabelCount>,
    /// Most frequent first; ties by type name.
    pub edges_by_type: Vec<EdgeTypeCount>,
    /// Highest total degree first; ties in insertion order.
    pub top_connected: Vec<NodeDegree>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTypeCount {
    pub edge_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDegree {
    pub id: NodeId,
    pub label: String,
    /// Incoming plus outgoing edges.
    pub degree: usize,
}

/// Compute statistics, keeping the `top_n` best-connected nodes.
pub fn graph_stats(store: &GraphStore, top_n: usize) -> GraphStats {
    let mut nodes_by_label: Vec<LabelCount> = store
        .schema()
        .labels()
        .into_iter()
        .map(|label| LabelCount {
            label: label.to_string(),
            count: store.nodes_by_label(label).len(),
        })
        .filter(|c| c.count > 0)
        .collect();
    nodes_by_label.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    let mut type_counts: HashMap<&str, usize> = HashMap::new();
    for edge in store.edges() {
        *type_counts.entry(edge.edge_type.as_str()).or_default() += 1;
    }
    let mut edges_by_type: Vec<EdgeTypeCount> = type_counts
        .into_iter()
        .map(|(edge_type, count)| EdgeTypeCount {
            edge_type: edge_type.to_string(),
            count,
        })
        .collect();
    edges_by_type.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.edge_type.cmp(&b.edge_type))
    });

    let mut degrees: Vec<NodeDegree> = store
        .nodes()
        .enumerate()
        .map(|(i, node)| NodeDegree {
            id: node.id.clone(),
            label: node.label.clone(),
            degree: store.out_edges(i).len() + store.in_edges(i).len(),
        })
        .collect();
    // Stable: equal degrees keep insertion order.
    degrees.sort_by(|a, b| b.degree.cmp(&a.degree));
    degrees.truncate(top_n);

    GraphStats {
        total_nodes: store.node_count(),
        total_edges: store.edge_count(),
        nodes_by_label,
        edges_by_type,
        top_connected: degrees,
    }
}
