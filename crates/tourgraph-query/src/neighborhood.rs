//! N-hop neighborhood of a node.
//!
//! Breadth-first from the center, recording the hop distance at which each
//! node is first reached. The returned edges are those among the reached
//! nodes (center included) that the walk was allowed to follow.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use tourgraph_core::{Edge, Node, NodeId};
use tourgraph_graph::GraphStore;

use crate::error::Result;
use crate::paths::node_index;
use crate::traversal::EdgeFilter;

#[derive(Debug, Clone, Serialize)]
pub struct Reached<'g> {
    pub node: &'g Node,
    pub hops: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Neighborhood<'g> {
    pub center: &'g Node,
    /// Reached nodes, excluding the center, by hop distance then discovery order.
    pub nodes: Vec<Reached<'g>>,
    /// Connecting edges in insertion order.
    pub edges: Vec<&'g Edge>,
}

impl Neighborhood<'_> {
    pub fn contains(&self, id: &NodeId) -> bool {
        self.center.id == *id || self.nodes.iter().any(|r| r.node.id == *id)
    }
}

pub(crate) fn neighborhood<'g>(
    store: &'g GraphStore,
    center: &NodeId,
    filter: &EdgeFilter,
    max_hops: usize,
) -> Result<Neighborhood<'g>> {
    let start = node_index(store, center)?;

    let mut distance: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut reached = Vec::new();
    let mut queue = VecDeque::from([(start, 0usize)]);

    while let Some((node, hops)) = queue.pop_front() {
        if hops > 0 {
            reached.push(Reached {
                node: store.node_at(node),
                hops,
            });
        }
        if hops >= max_hops {
            continue;
        }
        for (_, next) in filter.steps(store, node) {
            if let Entry::Vacant(slot) = distance.entry(next) {
                slot.insert(hops + 1);
                queue.push_back((next, hops + 1));
            }
        }
    }

    let mut edge_indices: Vec<usize> = distance
        .keys()
        .flat_map(|&node| filter.steps(store, node))
        .map(|(edge, _)| edge)
        .filter(|edge| {
            let (source, target) = store.endpoints_at(*edge);
            distance.contains_key(&source) && distance.contains_key(&target)
        })
        .collect();
    edge_indices.sort_unstable();
    edge_indices.dedup();

    tracing::debug!(
        center = %center,
        max_hops,
        nodes = reached.len(),
        edges = edge_indices.len(),
        "Neighborhood computed"
    );

    Ok(Neighborhood {
        center: store.node_at(start),
        nodes: reached,
        edges: edge_indices.into_iter().map(|e| store.edge_at(e)).collect(),
    })
}
