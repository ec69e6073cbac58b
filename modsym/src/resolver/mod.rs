//! # Address Resolution
//!
//! Maps a raw kernel address to the module symbol containing it. Modules are
//! tried in catalog order and the first match wins. Within a module the
//! lookup degrades through three tiers, each carrying less confidence:
//!
//! ```text
//! 1. Symbol      prev.address <= addr < next.address
//!                -> prev, offset = addr - prev, size = next - prev
//!
//! 2. ModuleTail  last.address <= addr < module end
//!                -> last, offset = addr - last, size = end - addr
//!
//! 3. ModuleOnly  base <= addr < module end, no usable symbol
//!                -> bare module name, offset = addr - base,
//!                   size = module extent
//! ```
//!
//! The tail size is a best-effort estimate (distance to the module end), not
//! the size of the last symbol.
//!
//! Tier 1 does not check the module range, so a module with at least two
//! symbols claims any address between its first and last symbol. An address
//! below a module's first symbol never brackets.
//!
//! ## Module Structure
//!
//! - **`oops`**: rewrites `[<address>]` tokens in kernel log lines
//! - **`render`**: display helpers (demangling of Rust symbol names)

pub mod oops;
pub mod render;

pub use oops::{expand_line, write_expanded};
pub use render::{demangle_qualified, render_resolution};

use crate::domain::{Catalog, MatchKind, Module, Resolution};

/// Resolve `addr` against every module in `catalog`
///
/// Returns `None` when no module claims the address; the caller decides
/// whether to fall back to another symbol source or print the raw address.
#[must_use]
pub fn resolve(catalog: &Catalog, addr: u64) -> Option<Resolution> {
    catalog.modules().iter().find_map(|module| resolve_in_module(module, catalog.page_size(), addr))
}

impl Catalog {
    /// See [`resolve`]
    #[must_use]
    pub fn resolve(&self, addr: u64) -> Option<Resolution> {
        resolve(self, addr)
    }
}

/// Try a single module
#[must_use]
pub fn resolve_in_module(module: &Module, page_size: u64, addr: u64) -> Option<Resolution> {
    let symbols = module.symbols();

    // Index of the first symbol strictly above addr. Equal to a linear scan
    // for the first adjacent pair whose upper bound exceeds addr.
    let above = symbols.partition_point(|s| s.address <= addr);

    if above > 0 && above < symbols.len() {
        let prev = &symbols[above - 1];
        let next = &symbols[above];
        return Some(Resolution {
            matched_name: prev.qualified_name.clone(),
            offset: addr - prev.address,
            size: next.address - prev.address,
            kind: MatchKind::Symbol,
        });
    }

    let info = module.info();
    let from_base = info.offset_of(addr, page_size)?;
    let extent = info.size_in_bytes(page_size);

    // above == len means addr is at or past the last symbol
    match symbols.last() {
        Some(last) if above == symbols.len() => Some(Resolution {
            matched_name: last.qualified_name.clone(),
            offset: addr - last.address,
            size: extent - from_base,
            kind: MatchKind::ModuleTail,
        }),
        _ => Some(Resolution {
            matched_name: module.name().to_string(),
            offset: from_base,
            size: extent,
            kind: MatchKind::ModuleOnly,
        }),
    }
}
