//! Two-phase loading: nodes first, then ownership edges.
//!
//! Phase 1 creates one node per record. Phase 2 walks the ownership mapping
//! table and joins each child's foreign-key attribute against owner ids,
//! creating one `owner -> child` edge per match. Both phases run inside one
//! transaction, so any failure leaves the committed store untouched.

use std::collections::BTreeMap;

use tourgraph_core::{Attributes, NodeId, NodeRecord, OwnershipMapping};

use crate::error::{GraphError, Result};
use crate::handle::{GraphHandle, LoadReport, Transaction};
use crate::schema::SchemaRegistry;
use crate::store::GraphStore;

impl GraphHandle {
    /// Create a graph and load it in one step.
    pub fn load_graph<I>(
        schema: SchemaRegistry,
        records: I,
        mappings: &[OwnershipMapping],
    ) -> Result<(GraphHandle, LoadReport)>
    where
        I: IntoIterator<Item = NodeRecord>,
    {
        let handle = GraphHandle::new(schema);
        let report = handle.load(records, mappings)?;
        Ok((handle, report))
    }

    /// Load records and synthesize ownership edges as one transaction.
    ///
    /// Ids already present in the store are rejected with `DuplicateNodeId`;
    /// there is no merge.
    pub fn load<I>(&self, records: I, mappings: &[OwnershipMapping]) -> Result<LoadReport>
    where
        I: IntoIterator<Item = NodeRecord>,
    {
        self.load_records(records.into_iter().map(Ok), mappings)
    }

    /// Like [`GraphHandle::load`], for record sources that can fail mid-stream.
    pub fn load_records<I>(&self, records: I, mappings: &[OwnershipMapping]) -> Result<LoadReport>
    where
        I: IntoIterator<Item = anyhow::Result<NodeRecord>>,
    {
        let mut tx = self.transaction();
        let transaction_id = tx.id();

        let staged = tx
            .load_nodes(records)
            .and_then(|nodes| Ok((nodes, tx.synthesize_ownership(mappings)?)));

        match staged {
            Ok((nodes, edges)) => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    nodes,
                    edges,
                    "Load phases complete"
                );
                tx.commit()
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Load failed, rolling back"
                );
                Err(e)
            }
        }
    }
}

impl Transaction<'_> {
    /// Phase 1: create one node per record.
    pub fn load_nodes<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = anyhow::Result<NodeRecord>>,
    {
        let mut created = 0;
        for record in records {
            let record = record.map_err(|source| GraphError::Source { source })?;
            self.create_node(&record.label, record.attributes)?;
            created += 1;
        }
        Ok(created)
    }

    /// Phase 2: create the ownership edges for `mappings` and for every
    /// mapping already upheld by the store.
    ///
    /// Returns the number of edges created. An owner -> child edge that
    /// already exists is reused, never doubled.
    pub fn synthesize_ownership(&mut self, mappings: &[OwnershipMapping]) -> Result<usize> {
        for mapping in mappings {
            self.staged().schema().validate_mapping(mapping)?;
        }
        for mapping in mappings {
            self.staged_mut().record_ownership(mapping);
        }

        let all = self.staged().ownership_mappings().to_vec();
        let mut created = 0;
        for mapping in &all {
            for (child, owner) in plan_edges(self.staged(), mapping)? {
                let exists = self
                    .staged()
                    .edges_between(&owner, &child, &mapping.edge_type)
                    .next()
                    .is_some();
                if !exists {
                    self.create_edge(&mapping.edge_type, &owner, &child, Attributes::new())?;
                    created += 1;
                }
            }
        }
        Ok(created)
    }
}

/// Resolve `(child, owner)` pairs for one mapping, failing on the first
/// foreign key with no owner.
fn plan_edges(store: &GraphStore, mapping: &OwnershipMapping) -> Result<Vec<(NodeId, NodeId)>> {
    store
        .nodes_by_label(&mapping.child_label)
        .filter_map(|child| {
            child
                .attr(&mapping.foreign_key)
                .map(|fk| (child.id.clone(), fk.as_id()))
        })
        .map(|(child_id, owner_id)| {
            let owner_id = NodeId(owner_id);
            match store.get_node(&owner_id) {
                Some(owner) if owner.label == mapping.owner_label => Ok((child_id, owner_id)),
                _ => Err(GraphError::ReferentialIntegrity {
                    child_id,
                    foreign_key: mapping.foreign_key.clone(),
                    owner_label: mapping.owner_label.clone(),
                    owner_id: owner_id.0,
                }),
            }
        })
        .collect()
}

/// Check every child covered by a recorded mapping.
///
/// Each foreign-key owner must have exactly one inbound edge of the mapped
/// type into the child. Several mappings may share an edge type, so other
/// owners' edges of that type are accepted only when another mapping names
/// them.
pub(crate) fn verify_ownership(store: &GraphStore) -> Result<()> {
    let mut owners: BTreeMap<(&NodeId, &str), Vec<String>> = BTreeMap::new();

    for mapping in store.ownership_mappings() {
        for child in store.nodes_by_label(&mapping.child_label) {
            let Some(fk) = child.attr(&mapping.foreign_key) else {
                continue;
            };
            let expected_owner = fk.as_id();

            let found = store
                .incoming(&child.id)
                .filter(|e| e.edge_type == mapping.edge_type && e.source.as_str() == expected_owner)
                .count();
            if found != 1 {
                return Err(GraphError::OwnershipConflict {
                    child_id: child.id.clone(),
                    edge_type: mapping.edge_type.clone(),
                    expected_owner,
                    found,
                });
            }

            owners
                .entry((&child.id, mapping.edge_type.as_str()))
                .or_default()
                .push(expected_owner);
        }
    }

    for ((child_id, edge_type), expected) in &owners {
        let stray = store
            .incoming(child_id)
            .filter(|e| e.edge_type == *edge_type)
            .find(|e| !expected.iter().any(|owner| owner == e.source.as_str()));
        if let Some(edge) = stray {
            return Err(GraphError::UnmappedOwner {
                child_id: (*child_id).clone(),
                edge_type: edge_type.to_string(),
                source_id: edge.source.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourgraph_core::{attrs, AttrValue, EdgeType, NodeType};

    fn schema() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        for label in ["City", "Attraction", "Food"] {
            schema.register_node_type(NodeType::new(label)).unwrap();
        }
        schema
            .register_edge_type(EdgeType::new("HAS_ATTRACTION").allow("City", "Attraction"))
            .unwrap();
        schema
            .register_edge_type(EdgeType::new("HAS_FOOD").allow("City", "Food"))
            .unwrap();
        schema
    }

    fn record(label: &str, pairs: &[(&str, &str)]) -> NodeRecord {
        NodeRecord::new(label, attrs(pairs.iter().copied()))
    }

    fn city_mapping() -> OwnershipMapping {
        OwnershipMapping::new("Attraction", "city_id", "HAS_ATTRACTION", "City")
    }

    #[test]
    fn test_children_without_foreign_key_get_no_edge() {
        let records = vec![
            record("City", &[("id", "beijing")]),
            record("Attraction", &[("id", "bj_gugong"), ("city_id", "beijing")]),
            record("Attraction", &[("id", "great_wall")]),
        ];
        let (handle, report) =
            GraphHandle::load_graph(schema(), records, &[city_mapping()]).unwrap();

        assert_eq!(report.total_edges(), 1);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.incoming(&NodeId::from("great_wall")).count(), 0);
    }

    #[test]
    fn test_records_may_arrive_children_first() {
        let records = vec![
            record("Attraction", &[("id", "bj_gugong"), ("city_id", "beijing")]),
            record("City", &[("id", "beijing")]),
        ];
        let (handle, _) = GraphHandle::load_graph(schema(), records, &[city_mapping()]).unwrap();
        assert_eq!(handle.snapshot().outgoing(&NodeId::from("beijing")).count(), 1);
    }

    #[test]
    fn test_owner_with_wrong_label_is_missing() {
        let records = vec![
            record("Food", &[("id", "beijing")]),
            record("Attraction", &[("id", "bj_gugong"), ("city_id", "beijing")]),
        ];
        let err = GraphHandle::load_graph(schema(), records, &[city_mapping()]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::ReferentialIntegrity { ref owner_id, ref owner_label, .. }
                if owner_id == "beijing" && owner_label == "City"
        ));
    }

    #[test]
    fn test_numeric_foreign_key_joins_string_id() {
        let records = vec![
            NodeRecord::new("City", attrs([("id", "7")])),
            NodeRecord::new(
                "Attraction",
                attrs([
                    ("id", AttrValue::from("a7")),
                    ("city_id", AttrValue::Num(7.0)),
                ]),
            ),
        ];
        let (handle, _) = GraphHandle::load_graph(schema(), records, &[city_mapping()]).unwrap();
        let edges: Vec<_> = handle.snapshot().outgoing(&NodeId::from("7")).cloned().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target.as_str(), "a7");
    }

    #[test]
    fn test_duplicate_mapping_does_not_double_edges() {
        let records = vec![
            record("City", &[("id", "beijing")]),
            record("Attraction", &[("id", "bj_gugong"), ("city_id", "beijing")]),
        ];
        let mappings = [city_mapping(), city_mapping()];
        let (handle, report) = GraphHandle::load_graph(schema(), records, &mappings).unwrap();
        assert_eq!(report.total_edges(), 1);
        assert_eq!(handle.snapshot().ownership_mappings().len(), 1);
    }

    #[test]
    fn test_invalid_mapping_rejected_before_any_edge() {
        let records = vec![record("City", &[("id", "beijing")])];
        let mapping = OwnershipMapping::new("Attraction", "city_id", "HAS_FOOD", "City");
        let handle = GraphHandle::new(schema());
        assert!(matches!(
            handle.load(records, &[mapping]),
            Err(GraphError::SchemaViolation(_))
        ));
        assert_eq!(handle.snapshot().node_count(), 0);
    }

    #[test]
    fn test_source_error_aborts_load() {
        let handle = GraphHandle::new(schema());
        let records = vec![
            Ok(record("City", &[("id", "beijing")])),
            Err(anyhow::anyhow!("row 2: malformed json")),
        ];
        let err = handle.load_records(records, &[]).unwrap_err();
        assert!(matches!(err, GraphError::Source { .. }));
        assert!(err.to_string().contains("malformed json"));
        assert_eq!(handle.snapshot().node_count(), 0);
    }

    #[test]
    fn test_later_load_upholds_earlier_mappings() {
        let handle = GraphHandle::new(schema());
        handle
            .load(
                vec![
                    record("City", &[("id", "beijing")]),
                    record("Attraction", &[("id", "bj_gugong"), ("city_id", "beijing")]),
                ],
                &[city_mapping()],
            )
            .unwrap();

        // No mappings passed: the recorded one still applies.
        let report = handle
            .load(
                vec![record("Attraction", &[("id", "bj_tiantan"), ("city_id", "beijing")])],
                &[],
            )
            .unwrap();
        assert_eq!(report.total_edges(), 1);
        assert_eq!(handle.snapshot().outgoing(&NodeId::from("beijing")).count(), 2);

        let err = handle
            .load(
                vec![record("Attraction", &[("id", "sh_bund"), ("city_id", "shanghai")])],
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::ReferentialIntegrity { .. }));
    }

    #[test]
    fn test_commit_rejects_conflicting_manual_edge() {
        let handle = GraphHandle::new(schema());
        let mut tx = handle.transaction();
        tx.load_nodes(
            vec![
                record("City", &[("id", "beijing")]),
                record("City", &[("id", "nanjing")]),
                record("Attraction", &[("id", "bj_gugong"), ("city_id", "beijing")]),
            ]
            .into_iter()
            .map(Ok),
        )
        .unwrap();
        tx.create_edge(
            "HAS_ATTRACTION",
            &NodeId::from("nanjing"),
            &NodeId::from("bj_gugong"),
            Attributes::new(),
        )
        .unwrap();
        tx.synthesize_ownership(&[city_mapping()]).unwrap();

        let err = tx.commit().unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnmappedOwner { ref source_id, .. } if source_id.as_str() == "nanjing"
        ));
        assert_eq!(handle.snapshot().node_count(), 0);
    }

    #[test]
    fn test_commit_rejects_foreign_key_changed_after_synthesis() {
        let handle = GraphHandle::new(schema());
        let mut tx = handle.transaction();
        tx.load_nodes(
            vec![
                record("City", &[("id", "beijing")]),
                record("City", &[("id", "nanjing")]),
                record("Attraction", &[("id", "bj_gugong"), ("city_id", "beijing")]),
            ]
            .into_iter()
            .map(Ok),
        )
        .unwrap();
        tx.synthesize_ownership(&[city_mapping()]).unwrap();
        tx.set_attribute(&NodeId::from("bj_gugong"), "city_id", "nanjing")
            .unwrap();

        assert!(matches!(
            tx.commit(),
            Err(GraphError::OwnershipConflict { found: 0, ref expected_owner, .. })
                if expected_owner == "nanjing"
        ));
    }

    #[test]
    fn test_mappings_may_share_an_edge_type() {
        let mut schema = SchemaRegistry::new();
        for label in ["Region", "SubRegion", "Attraction"] {
            schema.register_node_type(NodeType::new(label)).unwrap();
        }
        schema
            .register_edge_type(
                EdgeType::new("HAS_ATTRACTION")
                    .allow("Region", "Attraction")
                    .allow("SubRegion", "Attraction"),
            )
            .unwrap();
        let mappings = [
            OwnershipMapping::new("Attraction", "region_id", "HAS_ATTRACTION", "Region"),
            OwnershipMapping::new("Attraction", "subregion_id", "HAS_ATTRACTION", "SubRegion"),
        ];
        let records = vec![
            record("Region", &[("id", "tibet")]),
            record("SubRegion", &[("id", "lhasa")]),
            record(
                "Attraction",
                &[("id", "potala"), ("region_id", "tibet"), ("subregion_id", "lhasa")],
            ),
        ];

        let (handle, report) = GraphHandle::load_graph(schema, records, &mappings).unwrap();
        assert_eq!(report.edges_created.get("HAS_ATTRACTION"), Some(&2));

        let store = handle.snapshot();
        let mut owners: Vec<&str> = store
            .incoming(&NodeId::from("potala"))
            .map(|e| e.source.as_str())
            .collect();
        owners.sort_unstable();
        assert_eq!(owners, vec!["lhasa", "tibet"]);

        // A third owner of the shared type that no mapping names is still rejected.
        let mut tx = handle.transaction();
        tx.create_node("Region", attrs([("id", "yunnan")])).unwrap();
        tx.create_edge(
            "HAS_ATTRACTION",
            &NodeId::from("yunnan"),
            &NodeId::from("potala"),
            Attributes::new(),
        )
        .unwrap();
        assert!(matches!(
            tx.commit(),
            Err(GraphError::UnmappedOwner { ref source_id, .. }) if source_id.as_str() == "yunnan"
        ));
        assert_eq!(handle.snapshot().edge_count(), 2);
    }
}
