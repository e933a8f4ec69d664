//! Error types for the tourgraph-query crate.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query syntax error: {reason}")]
    Syntax { reason: String },

    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    /// Raised when an aggregate or sort would consume a truncated path stream.
    #[error("Path expansion budget of {max_expansions} exhausted before the query completed")]
    BudgetExhausted { max_expansions: usize },
}

impl QueryError {
    pub(crate) fn syntax(reason: impl Into<String>) -> Self {
        Self::Syntax {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
