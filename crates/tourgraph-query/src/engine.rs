//! Query engine bound to one committed snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tourgraph_core::{NodeId, QueryLimits};
use tourgraph_graph::{GraphHandle, GraphStore};

use crate::aggregate::aggregate;
use crate::error::{QueryError, Result};
use crate::filter::{filter_nodes, FilteredNodes};
use crate::neighborhood::{self, Neighborhood};
use crate::paths::{self, Path, PathBounds, PathIter};
use crate::pattern::{self, NodeFilter, PatternSpec, SortKey, Traversal};
use crate::row::{Cell, Fields, ResultRow};
use crate::stats::{graph_stats, GraphStats};
use crate::traversal::{self, Direction, EdgeFilter, Neighbors};

/// Read-only query entry point.
///
/// The engine pins the snapshot it was created from; loads committed
/// afterwards are not visible until a new engine is created.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    snapshot: Arc<GraphStore>,
    limits: QueryLimits,
}

/// Lazy sequence of result rows.
pub struct Rows<'q> {
    inner: Box<dyn Iterator<Item = ResultRow> + 'q>,
    truncated: Arc<AtomicBool>,
}

impl Rows<'_> {
    /// Whether the path expansion budget cut the rows short.
    ///
    /// Streamed path rows are produced lazily, so this is final only once
    /// the rows have been drained.
    pub fn truncated(&self) -> bool {
        self.truncated.load(Ordering::Relaxed)
    }
}

impl Iterator for Rows<'_> {
    type Item = ResultRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl std::fmt::Debug for Rows<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows").finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Query the handle's current committed snapshot.
    pub fn new(handle: &GraphHandle) -> Self {
        Self::from_snapshot(handle.snapshot())
    }

    pub fn from_snapshot(snapshot: Arc<GraphStore>) -> Self {
        Self {
            snapshot,
            limits: QueryLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &GraphStore {
        &self.snapshot
    }

    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Evaluate a pattern into rows.
    ///
    /// Node rows carry `id`, `label`, then attributes; path rows carry
    /// `start`, `end`, `hops`, `nodes`, `edges`; aggregate rows carry `key`
    /// and `count` or `values`. A projection replaces the default columns.
    ///
    /// Aggregating or sorting paths fails with `BudgetExhausted` when the
    /// expansion budget runs out; streamed path rows report it through
    /// [`Rows::truncated`] instead.
    pub fn query(&self, pattern: &PatternSpec) -> Result<Rows<'_>> {
        let store = self.store();
        pattern.validate(store.schema(), &self.limits)?;

        tracing::debug!(
            start = %pattern.start.label,
            traversal = pattern.traversal.is_some(),
            aggregate = pattern.aggregate.is_some(),
            "Evaluating query"
        );

        let starts = filter_nodes(store, &pattern.start);
        let columns = pattern.columns.clone();
        let truncated = Arc::new(AtomicBool::new(false));

        let rows: Box<dyn Iterator<Item = ResultRow> + '_> =
            match (&pattern.traversal, &pattern.aggregate) {
                (Some(traversal), Some(aggregation)) => {
                    let mut paths = self.path_iter(starts, traversal)?;
                    let rows = aggregate(paths.by_ref(), aggregation);
                    self.check_budget(&paths)?;
                    Box::new(rows.into_iter())
                }
                (Some(traversal), None) if pattern.sort.is_some() => {
                    let mut paths = self.path_iter(starts, traversal)?;
                    let rows: Vec<ResultRow> = paths
                        .by_ref()
                        .map(|path| path.to_row(columns.as_deref()))
                        .collect();
                    self.check_budget(&paths)?;
                    Box::new(rows.into_iter())
                }
                (Some(traversal), None) => {
                    let mut paths = self.path_iter(starts, traversal)?;
                    let flag = Arc::clone(&truncated);
                    Box::new(std::iter::from_fn(move || {
                        let path = paths.next();
                        if paths.budget_exhausted() {
                            flag.store(true, Ordering::Relaxed);
                        }
                        path.map(|path| path.to_row(columns.as_deref()))
                    }))
                }
                (None, Some(aggregation)) => Box::new(aggregate(starts, aggregation).into_iter()),
                (None, None) => Box::new(starts.map(move |node| node.to_row(columns.as_deref()))),
            };

        let rows: Box<dyn Iterator<Item = ResultRow> + '_> = match &pattern.sort {
            Some(sort) => Box::new(sort_rows(rows.collect(), sort).into_iter()),
            None => rows,
        };

        let limit = pattern
            .limit
            .unwrap_or(usize::MAX)
            .min(self.limits.max_rows);
        Ok(Rows {
            inner: Box::new(rows.take(limit)),
            truncated,
        })
    }

    /// Nodes passing `filter`, in insertion order.
    pub fn filter(&self, filter: &NodeFilter) -> Result<FilteredNodes<'_>> {
        pattern::validate_filter(filter, "start", self.store().schema())?;
        Ok(filter_nodes(self.store(), filter))
    }

    /// Single-hop neighbors of `id` over `edge_type`.
    pub fn neighbors(
        &self,
        id: &NodeId,
        edge_type: &str,
        direction: Direction,
    ) -> Result<Neighbors<'_>> {
        traversal::neighbors(self.store(), id, edge_type, direction)
    }

    /// Lazy paths for a pattern with a traversal, before row projection.
    pub fn paths(&self, pattern: &PatternSpec) -> Result<PathIter<'_>> {
        pattern.validate(self.store().schema(), &self.limits)?;
        let traversal = pattern
            .traversal
            .as_ref()
            .ok_or_else(|| QueryError::syntax("pattern has no traversal"))?;
        self.path_iter(filter_nodes(self.store(), &pattern.start), traversal)
    }

    /// Fewest-hop path between two nodes. An empty `edge_types` follows any type.
    pub fn shortest_path(
        &self,
        from: &NodeId,
        to: &NodeId,
        edge_types: &[&str],
        direction: Direction,
        max_hops: usize,
    ) -> Result<Option<Path<'_>>> {
        self.check_hops(max_hops)?;
        let filter = EdgeFilter::new(self.store(), edge_types, direction)?;
        paths::shortest_path(self.store(), from, to, &filter, max_hops)
    }

    /// Nodes and edges within `max_hops` of `center`. An empty `edge_types`
    /// follows any type.
    pub fn neighborhood(
        &self,
        center: &NodeId,
        edge_types: &[&str],
        direction: Direction,
        max_hops: usize,
    ) -> Result<Neighborhood<'_>> {
        self.check_hops(max_hops)?;
        let filter = EdgeFilter::new(self.store(), edge_types, direction)?;
        neighborhood::neighborhood(self.store(), center, &filter, max_hops)
    }

    /// Label and edge-type frequencies plus the `top_n` best-connected nodes.
    pub fn stats(&self, top_n: usize) -> GraphStats {
        graph_stats(self.store(), top_n)
    }

    fn path_iter<'q>(
        &'q self,
        starts: FilteredNodes<'q>,
        traversal: &Traversal,
    ) -> Result<PathIter<'q>> {
        let filter = EdgeFilter::new(self.store(), &traversal.edge_types, traversal.direction)?;
        Ok(PathIter::new(
            self.store(),
            starts,
            filter,
            traversal.end.clone(),
            PathBounds {
                min_hops: traversal.min_hops,
                max_hops: traversal.max_hops,
                max_expansions: self.limits.max_expansions,
            },
        ))
    }

    /// Fails when `paths` stopped expanding on the budget.
    fn check_budget(&self, paths: &PathIter<'_>) -> Result<()> {
        if paths.budget_exhausted() {
            return Err(QueryError::BudgetExhausted {
                max_expansions: self.limits.max_expansions,
            });
        }
        Ok(())
    }

    fn check_hops(&self, max_hops: usize) -> Result<()> {
        if max_hops > self.limits.max_hops_ceiling {
            return Err(QueryError::syntax(format!(
                "max_hops {} exceeds the ceiling of {}",
                max_hops, self.limits.max_hops_ceiling
            )));
        }
        Ok(())
    }
}

/// Stable sort on one column; rows missing the column sort as null.
fn sort_rows(mut rows: Vec<ResultRow>, sort: &SortKey) -> Vec<ResultRow> {
    let null = Cell::Null;
    rows.sort_by(|a, b| {
        let (x, y) = (
            a.get(&sort.column).unwrap_or(&null),
            b.get(&sort.column).unwrap_or(&null),
        );
        if sort.descending {
            y.total_cmp(x)
        } else {
            x.total_cmp(y)
        }
    });
    rows
}
