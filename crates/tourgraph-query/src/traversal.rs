//! Single-hop traversal over a committed snapshot.
//!
//! All walks in this crate step through an [`EdgeFilter`]: an optional
//! edge-type allow-list plus a direction. Edge types the schema marks
//! `symmetric` are followed both ways regardless of the requested direction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use tourgraph_core::{Edge, Node, NodeId};
use tourgraph_graph::GraphStore;

use crate::error::{QueryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

/// Which edges a walk may take from a node.
#[derive(Debug, Clone)]
pub(crate) struct EdgeFilter {
    /// `None` follows every type.
    allowed: Option<HashSet<String>>,
    direction: Direction,
}

/// Position within one node's outgoing then incoming adjacency.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StepCursor {
    out_pos: usize,
    in_pos: usize,
}

impl EdgeFilter {
    /// Build a filter over `edge_types`; an empty list follows every type.
    pub(crate) fn new<I, S>(store: &GraphStore, edge_types: I, direction: Direction) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = HashSet::new();
        for edge_type in edge_types {
            let edge_type = edge_type.as_ref();
            if store.schema().edge_type(edge_type).is_none() {
                return Err(QueryError::syntax(format!("unknown edge type {edge_type}")));
            }
            allowed.insert(edge_type.to_string());
        }
        Ok(Self {
            allowed: (!allowed.is_empty()).then_some(allowed),
            direction,
        })
    }

    /// Advance `cursor` to the next `(edge index, neighbor index)` step
    /// from `node`, outgoing edges first, each in insertion order.
    pub(crate) fn next_step(
        &self,
        store: &GraphStore,
        node: usize,
        cursor: &mut StepCursor,
    ) -> Option<(usize, usize)> {
        let out = store.out_edges(node);
        while let Some(&edge) = out.get(cursor.out_pos) {
            cursor.out_pos += 1;
            if self.follows_out(store, edge) {
                return Some((edge, store.endpoints_at(edge).1));
            }
        }

        let inc = store.in_edges(node);
        while let Some(&edge) = inc.get(cursor.in_pos) {
            cursor.in_pos += 1;
            let (source, target) = store.endpoints_at(edge);
            // A self-loop taken outward is not taken again inward.
            if source == target && self.follows_out(store, edge) {
                continue;
            }
            if self.follows_in(store, edge) {
                return Some((edge, source));
            }
        }
        None
    }

    /// Every step from `node`, in `next_step` order.
    pub(crate) fn steps(&self, store: &GraphStore, node: usize) -> Vec<(usize, usize)> {
        let mut cursor = StepCursor::default();
        std::iter::from_fn(|| self.next_step(store, node, &mut cursor)).collect()
    }

    pub(crate) fn allows_type(&self, edge_type: &str) -> bool {
        self.allowed
            .as_ref()
            .map_or(true, |allowed| allowed.contains(edge_type))
    }

    fn follows_out(&self, store: &GraphStore, edge: usize) -> bool {
        let edge = store.edge_at(edge);
        self.allows_type(&edge.edge_type)
            && (self.direction != Direction::Incoming
                || store.schema().is_symmetric(&edge.edge_type))
    }

    fn follows_in(&self, store: &GraphStore, edge: usize) -> bool {
        let edge = store.edge_at(edge);
        self.allows_type(&edge.edge_type)
            && (self.direction != Direction::Outgoing
                || store.schema().is_symmetric(&edge.edge_type))
    }
}

/// A node reached in one hop, with the edge that reached it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'g> {
    pub node: &'g Node,
    pub edge: &'g Edge,
}

/// Lazy single-hop expansion. Clone to restart from the same position.
#[derive(Debug, Clone)]
pub struct Neighbors<'g> {
    store: &'g GraphStore,
    filter: EdgeFilter,
    node: usize,
    cursor: StepCursor,
}

impl<'g> Iterator for Neighbors<'g> {
    type Item = Neighbor<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        let (edge, next) = self
            .filter
            .next_step(self.store, self.node, &mut self.cursor)?;
        Some(Neighbor {
            node: self.store.node_at(next),
            edge: self.store.edge_at(edge),
        })
    }
}

/// Neighbors of `id` over edges of `edge_type` in `direction`.
pub fn neighbors<'g>(
    store: &'g GraphStore,
    id: &NodeId,
    edge_type: &str,
    direction: Direction,
) -> Result<Neighbors<'g>> {
    let node = store
        .index_of(id)
        .ok_or_else(|| QueryError::NodeNotFound {
            node_id: id.to_string(),
        })?;
    let filter = EdgeFilter::new(store, [edge_type], direction)?;
    Ok(Neighbors {
        store,
        filter,
        node,
        cursor: StepCursor::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourgraph_core::{attrs, Attributes, EdgeType, NodeType};
    use tourgraph_graph::{GraphHandle, SchemaRegistry};

    fn handle() -> GraphHandle {
        let mut schema = SchemaRegistry::new();
        schema.register_node_type(NodeType::new("City")).unwrap();
        schema.register_node_type(NodeType::new("Attraction")).unwrap();
        schema
            .register_edge_type(EdgeType::new("HAS_ATTRACTION").allow("City", "Attraction"))
            .unwrap();
        schema
            .register_edge_type(EdgeType::new("NEARBY").allow("Attraction", "Attraction"))
            .unwrap();
        schema
            .register_edge_type(
                EdgeType::new("ADJACENT")
                    .allow("Attraction", "Attraction")
                    .symmetric(),
            )
            .unwrap();

        let handle = GraphHandle::new(schema);
        let mut tx = handle.transaction();
        for (label, id) in [
            ("City", "beijing"),
            ("Attraction", "gugong"),
            ("Attraction", "jingshan"),
            ("Attraction", "beihai"),
        ] {
            tx.create_node(label, attrs([("id", id)])).unwrap();
        }
        for (edge_type, source, target) in [
            ("HAS_ATTRACTION", "beijing", "gugong"),
            ("HAS_ATTRACTION", "beijing", "jingshan"),
            ("NEARBY", "gugong", "jingshan"),
            ("ADJACENT", "jingshan", "beihai"),
            ("NEARBY", "beihai", "beihai"),
        ] {
            tx.create_edge(
                edge_type,
                &NodeId::from(source),
                &NodeId::from(target),
                Attributes::new(),
            )
            .unwrap();
        }
        tx.commit().unwrap();
        handle
    }

    fn ids(neighbors: Neighbors<'_>) -> Vec<&str> {
        neighbors.map(|n| n.node.id.as_str()).collect()
    }

    #[test]
    fn test_outgoing_in_insertion_order_and_restartable() {
        let handle = handle();
        let store = handle.snapshot();
        let hop = neighbors(&store, &NodeId::from("beijing"), "HAS_ATTRACTION", Direction::Outgoing)
            .unwrap();
        assert_eq!(ids(hop.clone()), vec!["gugong", "jingshan"]);
        assert_eq!(ids(hop), vec!["gugong", "jingshan"]);
    }

    #[test]
    fn test_directions() {
        let handle = handle();
        let store = handle.snapshot();
        let jingshan = NodeId::from("jingshan");

        let incoming = neighbors(&store, &jingshan, "NEARBY", Direction::Incoming).unwrap();
        assert_eq!(ids(incoming), vec!["gugong"]);
        let outgoing = neighbors(&store, &jingshan, "NEARBY", Direction::Outgoing).unwrap();
        assert!(ids(outgoing).is_empty());
        let both = neighbors(&store, &NodeId::from("gugong"), "NEARBY", Direction::Both).unwrap();
        assert_eq!(ids(both), vec!["jingshan"]);
    }

    #[test]
    fn test_symmetric_type_followed_both_ways() {
        let handle = handle();
        let store = handle.snapshot();
        let back = neighbors(&store, &NodeId::from("beihai"), "ADJACENT", Direction::Outgoing)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(back.node.id.as_str(), "jingshan");
        assert_eq!(back.edge.source.as_str(), "jingshan");
    }

    #[test]
    fn test_self_loop_yielded_once() {
        let handle = handle();
        let store = handle.snapshot();
        let hop = neighbors(&store, &NodeId::from("beihai"), "NEARBY", Direction::Both).unwrap();
        assert_eq!(ids(hop), vec!["beihai"]);
    }

    #[test]
    fn test_unknown_node_and_edge_type() {
        let handle = handle();
        let store = handle.snapshot();
        assert!(matches!(
            neighbors(&store, &NodeId::from("lhasa"), "NEARBY", Direction::Outgoing),
            Err(QueryError::NodeNotFound { .. })
        ));
        assert!(matches!(
            neighbors(&store, &NodeId::from("beijing"), "FLIES_TO", Direction::Outgoing),
            Err(QueryError::Syntax { .. })
        ));
    }
}
