//! Graph handle, committed snapshots, and write transactions.
//!
//! A `GraphHandle` owns the schema and the last committed `GraphStore`.
//! Writers are serialized by a mutex held for the lifetime of a
//! `Transaction`; each transaction stages its work in a private copy of the
//! committed store and publishes it with a single pointer swap on commit.
//! Readers take `snapshot()` and are never blocked by, nor able to observe,
//! an in-flight transaction.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tourgraph_core::{AttrValue, Attributes, EdgeId, NodeId};

use crate::error::{GraphError, Result};
use crate::schema::SchemaRegistry;
use crate::store::GraphStore;

struct Inner {
    schema: Arc<SchemaRegistry>,
    committed: RwLock<Arc<GraphStore>>,
    writer: Mutex<()>,
}

/// Owner of one property graph.
///
/// Clone is cheap (inner Arc); clones share the same graph.
#[derive(Clone)]
pub struct GraphHandle {
    inner: Arc<Inner>,
}

impl GraphHandle {
    /// Create an empty graph governed by `schema`.
    pub fn new(schema: SchemaRegistry) -> Self {
        let schema = Arc::new(schema);
        let empty = GraphStore::new(Arc::clone(&schema));
        Self {
            inner: Arc::new(Inner {
                schema,
                committed: RwLock::new(Arc::new(empty)),
                writer: Mutex::new(()),
            }),
        }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.inner.schema
    }

    /// The last committed store.
    pub fn snapshot(&self) -> Arc<GraphStore> {
        Arc::clone(&self.inner.committed.read())
    }

    /// Begin a write transaction, waiting for any other writer to finish.
    pub fn transaction(&self) -> Transaction<'_> {
        let guard = self.inner.writer.lock();
        Transaction::begin(self, guard)
    }

    /// Begin a write transaction, failing if another one is open.
    pub fn try_transaction(&self) -> Result<Transaction<'_>> {
        let guard = self
            .inner
            .writer
            .try_lock()
            .ok_or(GraphError::TransactionInProgress)?;
        Ok(Transaction::begin(self, guard))
    }

    fn publish(&self, store: GraphStore) {
        *self.inner.committed.write() = Arc::new(store);
    }
}

impl std::fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("GraphHandle")
            .field("nodes", &snapshot.node_count())
            .field("edges", &snapshot.edge_count())
            .finish()
    }
}

/// Summary of a committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub transaction_id: Uuid,
    pub nodes_created: usize,
    /// Edge type → edges created.
    pub edges_created: BTreeMap<String, usize>,
    pub attributes_updated: usize,
    pub started_at: DateTime<Utc>,
    pub committed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl LoadReport {
    pub fn total_edges(&self) -> usize {
        self.edges_created.values().sum()
    }
}

/// An open write transaction.
///
/// Holds the writer lock until committed or dropped. Dropping without
/// committing discards every staged change.
pub struct Transaction<'h> {
    handle: &'h GraphHandle,
    staged: GraphStore,
    committed: bool,
    id: Uuid,
    started_at: DateTime<Utc>,
    created: HashSet<NodeId>,
    edges_created: BTreeMap<String, usize>,
    attributes_updated: usize,
    _writer: MutexGuard<'h, ()>,
}

impl<'h> Transaction<'h> {
    fn begin(handle: &'h GraphHandle, writer: MutexGuard<'h, ()>) -> Self {
        let staged = GraphStore::clone(&handle.snapshot());
        let id = Uuid::new_v4();
        tracing::debug!(transaction_id = %id, "Transaction started");
        Self {
            handle,
            staged,
            committed: false,
            id,
            started_at: Utc::now(),
            created: HashSet::new(),
            edges_created: BTreeMap::new(),
            attributes_updated: 0,
            _writer: writer,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The staged store, including uncommitted changes.
    pub fn staged(&self) -> &GraphStore {
        &self.staged
    }

    pub(crate) fn staged_mut(&mut self) -> &mut GraphStore {
        &mut self.staged
    }

    pub fn create_node(&mut self, label: &str, attributes: Attributes) -> Result<NodeId> {
        let id = self.staged_mut().create_node(label, attributes)?;
        self.created.insert(id.clone());
        Ok(id)
    }

    pub fn create_edge(
        &mut self,
        edge_type: &str,
        source: &NodeId,
        target: &NodeId,
        attributes: Attributes,
    ) -> Result<EdgeId> {
        let id = self
            .staged_mut()
            .create_edge(edge_type, source, target, attributes)?;
        *self.edges_created.entry(edge_type.to_string()).or_default() += 1;
        Ok(id)
    }

    /// Update an attribute of a node created in this transaction.
    ///
    /// Committed nodes are read-only, and a node's unique key never changes.
    pub fn set_attribute(
        &mut self,
        id: &NodeId,
        attribute: &str,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        if self.staged().get_node(id).is_some() && !self.created.contains(id) {
            return Err(GraphError::ImmutableAttribute {
                id: id.clone(),
                attribute: attribute.to_string(),
            });
        }
        self.staged_mut()
            .set_attribute(id, attribute, value.into())?;
        self.attributes_updated += 1;
        Ok(())
    }

    /// Verify every recorded ownership mapping and publish the staged store.
    pub fn commit(mut self) -> Result<LoadReport> {
        crate::loader::verify_ownership(&self.staged)?;

        let empty = GraphStore::new(Arc::clone(&self.handle.inner.schema));
        let staged = std::mem::replace(&mut self.staged, empty);
        let (nodes, edges) = (staged.node_count(), staged.edge_count());
        self.handle.publish(staged);
        self.committed = true;

        let committed_at = Utc::now();
        let report = LoadReport {
            transaction_id: self.id,
            nodes_created: self.created.len(),
            edges_created: std::mem::take(&mut self.edges_created),
            attributes_updated: self.attributes_updated,
            started_at: self.started_at,
            committed_at,
            duration_ms: (committed_at - self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        };

        tracing::info!(
            transaction_id = %report.transaction_id,
            nodes_created = report.nodes_created,
            edges_created = report.total_edges(),
            total_nodes = nodes,
            total_edges = edges,
            duration_ms = report.duration_ms,
            "Transaction committed"
        );
        Ok(report)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::warn!(
                transaction_id = %self.id,
                staged_nodes = self.created.len(),
                "Transaction rolled back"
            );
        }
    }
}
