//! # modsym - Loadable Kernel Module Address Resolver
//!
//! modsym turns raw kernel addresses from fault reports (oops messages, call
//! traces) into `module:symbol+0xoffset/0xsize`. Loadable modules are placed
//! at addresses unknown at link time, so a static `System.map` cannot explain
//! faults inside them; modsym builds its own table at runtime from whatever
//! the running kernel exposes.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Module/Symbol Query Service                   │
//! │   procfs (/proc/modules + /proc/kallsyms)  |  JSON fixture      │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ caller-sized buffers, "needs N bytes"
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     modsym (This Crate)                         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Catalog    │──▶│   Catalog    │──▶│   Resolver   │         │
//! │  │   Builder    │   │   Handle     │   │  (3 tiers)   │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! │   grow & retry,      Arc swap on          symbol bracket,       │
//! │   fail fast, sort    rebuild              module tail,          │
//! │                                           bare module           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`query`]: the [`ModuleQuery`](query::ModuleQuery) trait and its
//!   implementations, plus the grow-and-retry buffer helper
//! - [`catalog`]: one-shot catalog construction and atomic publication
//! - [`resolver`]: address lookup and fault-line annotation
//! - [`domain`]: catalog types and structured errors
//! - [`export`]: JSON fixture export of a catalog
//! - [`preflight`]: procfs visibility checks
//! - [`cli`]: command-line argument parsing
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! use modsym::catalog::{build_catalog, BuilderConfig};
//! use modsym::query::ProcfsQuery;
//!
//! let config = BuilderConfig::default();
//! let query = ProcfsQuery::new("/proc", config.page_size);
//! let catalog = build_catalog(&query, &config)?;
//!
//! if let Some(res) = catalog.resolve(0xffff_ffff_c0a0_1234) {
//!     println!("{res}"); // nf_tables:nft_trans_alloc+0x234/0x400
//! }
//! ```
//!
//! Addresses belonging to the main kernel image are not resolved; callers
//! fall back to a static symbol map for those.

pub mod catalog;
pub mod cli;
pub mod domain;
pub mod export;
pub mod preflight;
pub mod query;
pub mod resolver;

pub use catalog::{build_catalog, BuilderConfig, CatalogHandle};
pub use domain::{BuildError, Catalog, MatchKind, Module, Resolution, Symbol};
pub use resolver::resolve;
