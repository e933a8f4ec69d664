//! Bounded multi-hop path enumeration and shortest paths.
//!
//! `PathIter` expands a breadth-first frontier of partial paths. Each
//! partial path carries its own visited set, so a path never revisits a
//! node while different paths may share nodes. Paths are yielded lazily in
//! non-decreasing hop order; a partial path is only extended while it is
//! shorter than `max_hops`, so cycles cannot prevent termination.

use std::collections::{HashSet, VecDeque};

use tourgraph_core::{Edge, Node, NodeId};
use tourgraph_graph::GraphStore;

use crate::error::{QueryError, Result};
use crate::pattern::NodeFilter;
use crate::traversal::EdgeFilter;

/// An alternating node/edge sequence; `nodes.len() == edges.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Path<'g> {
    pub nodes: Vec<&'g Node>,
    pub edges: Vec<&'g Edge>,
}

impl<'g> Path<'g> {
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn start(&self) -> &'g Node {
        self.nodes[0]
    }

    pub fn end(&self) -> &'g Node {
        self.nodes[self.nodes.len() - 1]
    }

    fn resolve(store: &'g GraphStore, nodes: &[usize], edges: &[usize]) -> Self {
        Self {
            nodes: nodes.iter().map(|&i| store.node_at(i)).collect(),
            edges: edges.iter().map(|&e| store.edge_at(e)).collect(),
        }
    }
}

/// Hop bounds and expansion budget for one path query.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathBounds {
    pub min_hops: usize,
    pub max_hops: usize,
    pub max_expansions: usize,
}

#[derive(Debug, Clone)]
struct PartialPath {
    nodes: Vec<usize>,
    edges: Vec<usize>,
    visited: HashSet<usize>,
}

impl PartialPath {
    fn seed(node: usize) -> Self {
        Self {
            nodes: vec![node],
            edges: Vec::new(),
            visited: HashSet::from([node]),
        }
    }

    fn tip(&self) -> usize {
        self.nodes[self.nodes.len() - 1]
    }

    fn extend(&self, edge: usize, node: usize) -> Self {
        let mut next = self.clone();
        next.nodes.push(node);
        next.edges.push(edge);
        next.visited.insert(node);
        next
    }
}

/// Lazy breadth-first path enumeration.
#[derive(Debug, Clone)]
pub struct PathIter<'g> {
    store: &'g GraphStore,
    filter: EdgeFilter,
    end: Option<NodeFilter>,
    bounds: PathBounds,
    frontier: VecDeque<PartialPath>,
    expansions: usize,
    exhausted: bool,
}

impl<'g> PathIter<'g> {
    pub(crate) fn new<I>(
        store: &'g GraphStore,
        starts: I,
        filter: EdgeFilter,
        end: Option<NodeFilter>,
        bounds: PathBounds,
    ) -> Self
    where
        I: IntoIterator<Item = &'g Node>,
    {
        let frontier: VecDeque<PartialPath> = starts
            .into_iter()
            .filter_map(|node| store.index_of(&node.id))
            .map(PartialPath::seed)
            .collect();
        tracing::debug!(
            starts = frontier.len(),
            min_hops = bounds.min_hops,
            max_hops = bounds.max_hops,
            "Path expansion started"
        );
        Self {
            store,
            filter,
            end,
            bounds,
            frontier,
            expansions: 0,
            exhausted: false,
        }
    }

    /// Whether expansion stopped early because the budget ran out.
    ///
    /// Once set, paths not yet on the frontier are never produced.
    pub fn budget_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Partial paths pushed so far.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    fn expand(&mut self, partial: &PartialPath) {
        if self.exhausted || partial.edges.len() >= self.bounds.max_hops {
            return;
        }
        for (edge, next) in self.filter.steps(self.store, partial.tip()) {
            if partial.visited.contains(&next) {
                continue;
            }
            if self.expansions >= self.bounds.max_expansions {
                self.exhausted = true;
                tracing::warn!(
                    max_expansions = self.bounds.max_expansions,
                    hops = partial.edges.len(),
                    "Path expansion budget exhausted, results truncated"
                );
                return;
            }
            self.expansions += 1;
            self.frontier.push_back(partial.extend(edge, next));
        }
    }

    fn accepts(&self, partial: &PartialPath) -> bool {
        let hops = partial.edges.len();
        hops >= self.bounds.min_hops
            && hops <= self.bounds.max_hops
            && self
                .end
                .as_ref()
                .map_or(true, |end| end.matches(self.store.node_at(partial.tip())))
    }
}

impl<'g> Iterator for PathIter<'g> {
    type Item = Path<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(partial) = self.frontier.pop_front() {
            self.expand(&partial);
            if self.accepts(&partial) {
                return Some(Path::resolve(self.store, &partial.nodes, &partial.edges));
            }
        }
        None
    }
}

/// Fewest-hop path from `from` to `to` within `max_hops`, or `None`.
///
/// Ties are broken by adjacency order, so the result is deterministic.
pub(crate) fn shortest_path<'g>(
    store: &'g GraphStore,
    from: &NodeId,
    to: &NodeId,
    filter: &EdgeFilter,
    max_hops: usize,
) -> Result<Option<Path<'g>>> {
    let source = node_index(store, from)?;
    let target = node_index(store, to)?;

    // node -> (previous node, edge taken)
    let mut previous: Vec<Option<(usize, usize)>> = vec![None; store.node_count()];
    let mut visited = HashSet::from([source]);
    let mut queue = VecDeque::from([(source, 0usize)]);

    while let Some((node, hops)) = queue.pop_front() {
        if node == target {
            let (mut nodes, mut edges) = (vec![target], Vec::new());
            let mut cursor = target;
            while let Some((prev, edge)) = previous[cursor] {
                nodes.push(prev);
                edges.push(edge);
                cursor = prev;
            }
            nodes.reverse();
            edges.reverse();
            return Ok(Some(Path::resolve(store, &nodes, &edges)));
        }
        if hops >= max_hops {
            continue;
        }
        for (edge, next) in filter.steps(store, node) {
            if visited.insert(next) {
                previous[next] = Some((node, edge));
                queue.push_back((next, hops + 1));
            }
        }
    }
    Ok(None)
}

pub(crate) fn node_index(store: &GraphStore, id: &NodeId) -> Result<usize> {
    store.index_of(id).ok_or_else(|| QueryError::NodeNotFound {
        node_id: id.to_string(),
    })
}
