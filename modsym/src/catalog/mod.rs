//! # Module Catalog
//!
//! Construction and publication of the module/symbol table.
//!
//! ```text
//! ModuleQuery ──▶ build_catalog() ──▶ Catalog ──▶ CatalogHandle::publish()
//!                  │                                 │
//!                  │ grow-and-retry per query         │ Arc swap
//!                  │ sort each module by address      ▼
//!                  └─ any failure: no catalog       resolvers take snapshot()
//! ```
//!
//! - **`builder`**: one-shot construction with fail-fast error handling
//! - **`handle`**: shared, atomically replaceable reference for callers that
//!   rebuild while resolving, and the gate that coalesces reload requests

pub mod builder;
pub mod handle;

pub use builder::{build_catalog, host_page_size, BuilderConfig, DEFAULT_MAX_BUFFER};
pub use handle::{CatalogHandle, ReloadGate};
