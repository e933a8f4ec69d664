//! Label and attribute filters.

use tourgraph_core::Node;
use tourgraph_graph::{GraphStore, LabelScan};

use crate::pattern::{Match, NodeFilter, Predicate};

/// Nodes passing a [`NodeFilter`], in insertion order.
#[derive(Debug, Clone)]
pub struct FilteredNodes<'g> {
    source: Source<'g>,
    predicate: Option<Predicate>,
}

#[derive(Debug, Clone)]
enum Source<'g> {
    /// Equality lookup answered by a declared attribute index.
    Indexed(std::vec::IntoIter<&'g Node>),
    Scan(LabelScan<'g>),
}

impl<'g> Iterator for FilteredNodes<'g> {
    type Item = &'g Node;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Indexed(nodes) => nodes.next(),
            Source::Scan(scan) => {
                let predicate = self.predicate.as_ref();
                scan.find(|node| predicate.map_or(true, |p| p.matches(node)))
            }
        }
    }
}

/// Nodes of `filter.label` matching its predicate. Unknown labels match nothing.
pub fn filter_nodes<'g>(store: &'g GraphStore, filter: &NodeFilter) -> FilteredNodes<'g> {
    let source = match &filter.predicate {
        Some(Predicate {
            attribute,
            op: Match::Equals(value),
        }) if store.is_indexed(&filter.label, attribute) => Source::Indexed(
            store
                .find_by_attribute(&filter.label, attribute, value)
                .into_iter(),
        ),
        _ => Source::Scan(store.nodes_by_label(&filter.label)),
    };
    tracing::trace!(
        label = %filter.label,
        indexed = matches!(source, Source::Indexed(_)),
        "Node filter planned"
    );
    FilteredNodes {
        source,
        predicate: filter.predicate.clone(),
    }
}
