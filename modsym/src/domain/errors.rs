//! Structured error types for modsym
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

/// Failure reported by a module/symbol query service
#[derive(Error, Debug)]
pub enum QueryError {
    /// The caller's buffer is too small; retry with at least this many bytes
    #[error("Buffer too small: {0} bytes required")]
    NeedsCapacity(usize),

    #[error("Module {0} not found")]
    NoSuchModule(String),

    #[error("Module query unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed query result: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<modsym_common::LayoutError> for QueryError {
    fn from(err: modsym_common::LayoutError) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Failure of a whole catalog build. No partial catalog exists when one of
/// these is returned.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Error querying {what}: {source}")]
    QueryFailed {
        what: String,
        #[source]
        source: QueryError,
    },

    #[error("Failed to allocate {requested} bytes for {what}")]
    AllocationFailed { what: String, requested: usize },
}

impl BuildError {
    pub(crate) fn query(what: impl Into<String>, source: QueryError) -> Self {
        Self::QueryFailed { what: what.into(), source }
    }
}

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Failed to parse fixture: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate module {0} in fixture")]
    DuplicateModule(String),

    #[error("Invalid name {0:?} in fixture")]
    InvalidName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Symbol {0} is missing its module prefix")]
    UnqualifiedSymbol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
