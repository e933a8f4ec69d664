//! Grouping and reduction over node, edge or path sequences.
//!
//! Groups appear in the order their key is first seen. Items with no value
//! for the grouping key fall into a single `null` group.

use std::collections::HashMap;

use crate::pattern::{Aggregation, GroupKey, Reducer};
use crate::row::{Cell, Fields, ResultRow};

#[derive(Debug)]
enum Accumulator {
    Count(usize),
    Collect(Vec<Cell>),
}

impl Accumulator {
    fn new(reducer: &Reducer) -> Self {
        match reducer {
            Reducer::Count => Self::Count(0),
            Reducer::CollectOrdered(_) => Self::Collect(Vec::new()),
        }
    }

    fn add(&mut self, reducer: &Reducer, item: &impl Fields) {
        match (self, reducer) {
            (Self::Count(n), _) => *n += 1,
            (Self::Collect(values), Reducer::CollectOrdered(field)) => {
                values.push(item.field(field))
            }
            (Self::Collect(_), Reducer::Count) => {}
        }
    }

    fn finish(self) -> Cell {
        match self {
            Self::Count(n) => n.into(),
            Self::Collect(values) => Cell::List(values),
        }
    }
}

/// The grouping key of one item.
pub fn group_key(item: &impl Fields, key: &GroupKey) -> Cell {
    match key {
        GroupKey::Label => item.label().map_or(Cell::Null, Cell::str),
        GroupKey::EdgeType => item.edge_type().map_or(Cell::Null, Cell::str),
        GroupKey::Attribute(name) => item.field(name),
    }
}

/// Reduce `items` into one row per group: `key`, then `count` or `values`.
pub fn aggregate<I>(items: I, aggregation: &Aggregation) -> Vec<ResultRow>
where
    I: IntoIterator,
    I::Item: Fields,
{
    let reducer = &aggregation.reducer;
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Cell, Accumulator)> = Vec::new();

    for item in items {
        let key = group_key(&item, &aggregation.group_by);
        let slot = *positions.entry(key.key()).or_insert_with(|| {
            groups.push((key, Accumulator::new(reducer)));
            groups.len() - 1
        });
        groups[slot].1.add(reducer, &item);
    }

    tracing::debug!(groups = groups.len(), "Aggregation complete");

    groups
        .into_iter()
        .map(|(key, acc)| {
            ResultRow::new()
                .with("key", key)
                .with(reducer.column(), acc.finish())
        })
        .collect()
}
