//! Error surface for catalog lookups.

use std::fmt;

use thiserror::Error;

use crate::key::NodeKey;

/// Identifies which table a failed lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    VariableBindings,
    OutputTensors,
    AssignInfo,
}

impl TableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::VariableBindings => "variable-binding",
            TableKind::OutputTensors => "output-tensor",
            TableKind::AssignInfo => "assign-elision",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors surfaced by value-returning catalog lookups.
///
/// A miss is a contract violation, not a transient condition: callers that
/// cannot guarantee an entry was recorded must use the existence checks
/// first, or treat absence as "no decision recorded".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no {table} entry recorded for {key}")]
    NotFound { table: TableKind, key: String },
}

impl CatalogError {
    pub(crate) fn not_found(table: TableKind, key: &NodeKey) -> Self {
        CatalogError::NotFound {
            table,
            key: key.encode(),
        }
    }
}

/// Convenience alias for results returned by catalog lookups.
pub type CatalogResult<T> = Result<T, CatalogError>;
