//! # Module/Symbol Query Services
//!
//! The catalog builder never talks to the kernel directly. It goes through a
//! [`ModuleQuery`], which exposes the three operations of the classic kernel
//! module query interface:
//!
//! ```text
//! list_module_names(buf)          -> count   (NUL-separated names in buf)
//! module_info(name)               -> ModuleInfo
//! list_module_symbols(name, buf)  -> count   (RawSymbol entries + name blob)
//! ```
//!
//! Both list operations fill a caller-supplied buffer using the layout from
//! [`modsym_common`]. A buffer that is too small is reported as
//! [`QueryError::NeedsCapacity`] rather than silently truncated; the caller
//! grows and retries (see [`retry`]).
//!
//! ## Implementations
//!
//! - **`procfs`**: the running kernel, through `/proc/modules` and
//!   `/proc/kallsyms`
//! - **`fixture`**: an in-memory module set loaded from JSON, used for
//!   offline replay and tests

pub mod fixture;
pub mod procfs;
pub mod retry;

pub use fixture::FixtureQuery;
pub use modsym_common::ModuleInfo;
pub use procfs::ProcfsQuery;
pub use retry::{query_with_retry, QueryBuffer};

use crate::domain::QueryError;

/// A source of loaded-module and exported-symbol information
pub trait ModuleQuery: Send + Sync {
    /// Write the names of all loaded modules into `buf`
    ///
    /// # Errors
    /// [`QueryError::NeedsCapacity`] when `buf` is too small, any other
    /// variant when the enumeration itself fails
    fn list_module_names(&self, buf: &mut [u8]) -> Result<usize, QueryError>;

    /// Placement of the named module
    ///
    /// # Errors
    /// Returns an error if the module cannot be described
    fn module_info(&self, name: &str) -> Result<ModuleInfo, QueryError>;

    /// Write the exported symbol table of the named module into `buf`
    ///
    /// # Errors
    /// [`QueryError::NeedsCapacity`] when `buf` is too small, any other
    /// variant when the enumeration itself fails
    fn list_module_symbols(&self, name: &str, buf: &mut [u8]) -> Result<usize, QueryError>;
}
