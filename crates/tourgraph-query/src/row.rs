//! Result rows: named cells in a fixed column order.
//!
//! Every query result, whether nodes, paths or aggregate groups, is
//! projected through [`Fields`] into a [`ResultRow`]. Rows serialize as JSON
//! objects whose keys keep the row's column order.

use std::cmp::Ordering;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use tourgraph_core::{AttrValue, Edge, Node};

use crate::paths::Path;
use crate::traversal::Neighbor;

/// One value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Value(AttrValue),
    List(Vec<Cell>),
}

impl Cell {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Value(AttrValue::Str(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Cell]> {
        match self {
            Self::List(cells) => Some(cells),
            _ => None,
        }
    }

    /// Type-qualified identity, used to bucket equal cells into one group.
    pub(crate) fn key(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Int(n) => format!("i:{n}"),
            Self::Value(v) => v.key(),
            Self::List(cells) => {
                let keys: Vec<String> = cells.iter().map(Cell::key).collect();
                format!("l:[{}]", keys.join(","))
            }
        }
    }

    /// Total order used by sorting: null < numbers < strings and tags < lists.
    pub fn total_cmp(&self, other: &Cell) -> Ordering {
        if let (Some(a), Some(b)) = (self.number(), other.number()) {
            return a.total_cmp(&b);
        }
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a.as_str().cmp(&b.as_str()),
            (Self::List(a), Self::List(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => Ordering::Equal,
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Value(v) => v.as_f64(),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) => 1,
            Self::Value(AttrValue::Num(_)) => 1,
            Self::Value(_) => 2,
            Self::List(_) => 3,
        }
    }
}

impl From<AttrValue> for Cell {
    fn from(value: AttrValue) -> Self {
        Self::Value(value)
    }
}

impl From<Option<&AttrValue>> for Cell {
    fn from(value: Option<&AttrValue>) -> Self {
        value.cloned().map_or(Self::Null, Self::Value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// A named-column record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    columns: Vec<(String, Cell)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Column order is append order.
    pub fn push(&mut self, name: impl Into<String>, cell: Cell) {
        self.columns.push((name.into(), cell));
    }

    pub fn with(mut self, name: impl Into<String>, cell: Cell) -> Self {
        self.push(name, cell);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, cell)| cell)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.columns.iter().map(|(_, cell)| cell)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, cell) in &self.columns {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

/// Named fields of a query result item.
///
/// `field` resolves a column name (pseudo-columns first, then attributes)
/// and returns `Cell::Null` when the item has no such field.
pub trait Fields {
    fn field(&self, name: &str) -> Cell;

    /// Columns emitted when the query names none.
    fn default_columns(&self) -> Vec<String>;

    fn label(&self) -> Option<&str>;

    fn edge_type(&self) -> Option<&str>;

    fn to_row(&self, columns: Option<&[String]>) -> ResultRow {
        let names = match columns {
            Some(names) => names.to_vec(),
            None => self.default_columns(),
        };
        names.into_iter().fold(ResultRow::new(), |row, name| {
            let cell = self.field(&name);
            row.with(name, cell)
        })
    }
}

impl<T: Fields + ?Sized> Fields for &T {
    fn field(&self, name: &str) -> Cell {
        (**self).field(name)
    }

    fn default_columns(&self) -> Vec<String> {
        (**self).default_columns()
    }

    fn label(&self) -> Option<&str> {
        (**self).label()
    }

    fn edge_type(&self) -> Option<&str> {
        (**self).edge_type()
    }
}

impl Fields for Node {
    fn field(&self, name: &str) -> Cell {
        match name {
            "id" => Cell::str(self.id.as_str()),
            "label" => Cell::str(self.label.as_str()),
            _ => self.attr(name).into(),
        }
    }

    fn default_columns(&self) -> Vec<String> {
        ["id", "label"]
            .into_iter()
            .map(String::from)
            .chain(self.attributes.keys().filter(|k| *k != "id").cloned())
            .collect()
    }

    fn label(&self) -> Option<&str> {
        Some(&self.label)
    }

    fn edge_type(&self) -> Option<&str> {
        None
    }
}

impl Fields for Edge {
    fn field(&self, name: &str) -> Cell {
        match name {
            "id" => Cell::str(self.id.to_string()),
            "type" => Cell::str(self.edge_type.as_str()),
            "source" => Cell::str(self.source.as_str()),
            "target" => Cell::str(self.target.as_str()),
            _ => self.attributes.get(name).into(),
        }
    }

    fn default_columns(&self) -> Vec<String> {
        ["id", "type", "source", "target"]
            .into_iter()
            .map(String::from)
            .chain(self.attributes.keys().cloned())
            .collect()
    }

    fn label(&self) -> Option<&str> {
        None
    }

    fn edge_type(&self) -> Option<&str> {
        Some(&self.edge_type)
    }
}

/// Path columns: `start`, `end`, `hops`, `nodes` (ids), `edges` (types).
/// Any other name reads an attribute of the end node.
impl Fields for Path<'_> {
    fn field(&self, name: &str) -> Cell {
        match name {
            "start" => Cell::str(self.start().id.as_str()),
            "end" => Cell::str(self.end().id.as_str()),
            "hops" => self.hops().into(),
            "nodes" => Cell::List(self.nodes.iter().map(|n| Cell::str(n.id.as_str())).collect()),
            "edges" => Cell::List(
                self.edges
                    .iter()
                    .map(|e| Cell::str(e.edge_type.as_str()))
                    .collect(),
            ),
            _ => self.end().field(name),
        }
    }

    fn default_columns(&self) -> Vec<String> {
        PATH_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn label(&self) -> Option<&str> {
        Some(&self.end().label)
    }

    fn edge_type(&self) -> Option<&str> {
        self.edges.last().map(|e| e.edge_type.as_str())
    }
}

pub(crate) const PATH_COLUMNS: [&str; 5] = ["start", "end", "hops", "nodes", "edges"];

impl Fields for Neighbor<'_> {
    fn field(&self, name: &str) -> Cell {
        match name {
            "edge_type" => Cell::str(self.edge.edge_type.as_str()),
            _ => self.node.field(name),
        }
    }

    fn default_columns(&self) -> Vec<String> {
        let mut columns = self.node.default_columns();
        columns.insert(2, "edge_type".to_string());
        columns
    }

    fn label(&self) -> Option<&str> {
        Some(&self.node.label)
    }

    fn edge_type(&self) -> Option<&str> {
        Some(&self.edge.edge_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourgraph_core::{attrs, NodeId};

    fn gugong() -> Node {
        Node {
            id: NodeId::from("bj_gugong"),
            label: "Attraction".to_string(),
            attributes: attrs([
                ("id", AttrValue::from("bj_gugong")),
                ("name", AttrValue::from("Gugong")),
                ("rating", AttrValue::Num(4.8)),
            ]),
        }
    }

    #[test]
    fn test_node_row_default_columns() {
        let row = gugong().to_row(None);
        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["id", "label", "name", "rating"]);
        assert_eq!(row.get("label").and_then(Cell::as_str), Some("Attraction"));
    }

    #[test]
    fn test_node_row_projection_fills_missing_with_null() {
        let columns = vec!["name".to_string(), "city_id".to_string()];
        let row = gugong().to_row(Some(&columns));
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Cell::str("Gugong")));
        assert!(row.get("city_id").is_some_and(Cell::is_null));
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = ResultRow::new()
            .with("zeta", Cell::Int(1))
            .with("alpha", Cell::Null)
            .with("tag", Cell::Value(AttrValue::tag("5A")))
            .with("list", Cell::List(vec![Cell::str("a"), Cell::Int(2)]));
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"zeta":1,"alpha":null,"tag":{"tag":"5A"},"list":["a",2]}"#
        );
    }

    #[test]
    fn test_cell_ordering() {
        let mut cells = vec![
            Cell::List(vec![]),
            Cell::str("b"),
            Cell::Int(3),
            Cell::Null,
            Cell::Value(AttrValue::Num(2.5)),
            Cell::str("a"),
        ];
        cells.sort_by(Cell::total_cmp);
        assert_eq!(
            cells,
            vec![
                Cell::Null,
                Cell::Value(AttrValue::Num(2.5)),
                Cell::Int(3),
                Cell::str("a"),
                Cell::str("b"),
                Cell::List(vec![]),
            ]
        );
    }

    #[test]
    fn test_cell_keys_distinguish_types() {
        assert_ne!(Cell::Int(5).key(), Cell::Value(AttrValue::Num(5.0)).key());
        assert_ne!(Cell::str("5").key(), Cell::Value(AttrValue::tag("5")).key());
        assert_eq!(Cell::Null.key(), Cell::Null.key());
    }
}
