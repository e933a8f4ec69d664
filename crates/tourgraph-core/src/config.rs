//! Configuration management for tourgraph embedders.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`TOURGRAPH__` prefix, `__` separator)
//! 2. Config file (`<prefix>.toml`, optional)
//! 3. Defaults

use serde::Deserialize;

use crate::error::Result;
use crate::types::{EdgeType, NodeType, OwnershipMapping};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TourgraphConfig {
    /// Node and edge type descriptors, supplied before any load.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Foreign-key → edge rules applied by the loader.
    #[serde(default)]
    pub ownership: Vec<OwnershipMapping>,

    /// Cost bounds for queries.
    #[serde(default)]
    pub query: QueryLimits,
}

/// Schema descriptors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub node_types: Vec<NodeType>,

    #[serde(default)]
    pub edge_types: Vec<EdgeType>,
}

/// Bounds applied to every query against a snapshot.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QueryLimits {
    /// Largest `max_hops` a path query may ask for.
    #[serde(default = "default_max_hops_ceiling")]
    pub max_hops_ceiling: usize,

    /// Partial paths a single path query may push onto its frontier.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Rows a single query may emit.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_max_hops_ceiling() -> usize {
    8
}

fn default_max_expansions() -> usize {
    1_000_000
}

fn default_max_rows() -> usize {
    100_000
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_hops_ceiling: default_max_hops_ceiling(),
            max_expansions: default_max_expansions(),
            max_rows: default_max_rows(),
        }
    }
}

impl TourgraphConfig {
    /// Load configuration from `<file_prefix>.toml` (if present) layered
    /// under `TOURGRAPH__*` environment variables.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TOURGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: TourgraphConfig = cfg.try_deserialize()?;
        tracing::debug!(
            node_types = loaded.schema.node_types.len(),
            edge_types = loaded.schema.edge_types.len(),
            mappings = loaded.ownership.len(),
            "Configuration loaded"
        );
        Ok(loaded)
    }
}
