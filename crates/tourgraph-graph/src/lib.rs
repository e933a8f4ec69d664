//! Tourgraph Graph: schema-checked in-memory property graph.
//!
//! This crate is the single mutation point for the graph. Every write goes
//! through a `Transaction` opened on a `GraphHandle`, is validated against
//! the handle's immutable `SchemaRegistry`, and becomes visible to readers
//! only when the transaction commits. The two-phase loader builds on the
//! same transaction: nodes first, then ownership edges synthesized from
//! foreign-key attributes.

pub mod error;
pub mod handle;
pub mod loader;
pub mod schema;
pub mod store;

pub use error::{GraphError, Result, Violation};
pub use handle::{GraphHandle, LoadReport, Transaction};
pub use schema::SchemaRegistry;
pub use store::{GraphStore, LabelScan};
