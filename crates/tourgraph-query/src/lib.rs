//! tourgraph-query: Read-only queries over committed tourgraph snapshots.
//!
//! A `QueryEngine` pins one committed `GraphStore` snapshot and evaluates
//! declarative `PatternSpec`s against it: label/attribute filters, single-hop
//! neighbors, bounded breadth-first path enumeration, grouping with `count`
//! or `collect_ordered`, sorting and projection into named-column rows.
//! Shortest paths, N-hop neighborhoods and snapshot statistics are exposed
//! alongside. Queries never mutate the store.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod filter;
pub mod neighborhood;
pub mod paths;
pub mod pattern;
pub mod row;
pub mod stats;
pub mod traversal;

pub use engine::{QueryEngine, Rows};
pub use error::{QueryError, Result};
pub use filter::FilteredNodes;
pub use neighborhood::{Neighborhood, Reached};
pub use paths::{Path, PathIter};
pub use pattern::{
    Aggregation, GroupKey, Match, NodeFilter, PatternSpec, Predicate, Reducer, SortKey, Traversal,
};
pub use row::{Cell, Fields, ResultRow};
pub use stats::{EdgeTypeCount, GraphStats, LabelCount, NodeDegree};
pub use traversal::{Direction, Neighbor, Neighbors};
