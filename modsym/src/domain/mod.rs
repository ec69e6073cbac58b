//! Domain model for modsym
//!
//! This module contains the core domain types and errors:
//! - The immutable [`Catalog`] of loaded modules and their symbols
//! - The [`Resolution`] produced for a single address
//! - Structured error handling for catalog construction

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{Catalog, MatchKind, Module, Resolution, Symbol};

pub use errors::{BuildError, ExportError, FixtureError, QueryError};
