//! Catalog types
//!
//! A [`Catalog`] is built in one shot and never mutated afterwards. Nothing
//! handed out by a lookup borrows from it: [`Resolution`] owns its name, so a
//! catalog can be replaced while results from the old one are still in use.

use modsym_common::ModuleInfo;
use serde::Serialize;
use std::fmt;

/// An exported symbol, named `"<module>:<symbol>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub address: u64,
    pub qualified_name: String,
}

impl Symbol {
    /// Create a symbol owned by `module`
    #[must_use]
    pub fn new(module: &str, name: &str, address: u64) -> Self {
        let mut qualified_name = String::with_capacity(module.len() + 1 + name.len());
        qualified_name.push_str(module);
        qualified_name.push(':');
        qualified_name.push_str(name);
        Self { address, qualified_name }
    }

    /// Module prefix of the qualified name
    #[must_use]
    pub fn module_name(&self) -> &str {
        self.qualified_name.split_once(':').map_or("", |(module, _)| module)
    }

    /// Symbol name as exported by the module, without the prefix
    #[must_use]
    pub fn exported_name(&self) -> &str {
        self.qualified_name.split_once(':').map_or(self.qualified_name.as_str(), |(_, name)| name)
    }
}

/// A loaded module and its symbol table, sorted by address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: String,
    info: ModuleInfo,
    symbols: Vec<Symbol>,
}

impl Module {
    /// Create a module, sorting `symbols` ascending by address
    ///
    /// The sort is stable, so symbols sharing an address keep their
    /// enumeration order. Callers should not depend on that order.
    #[must_use]
    pub fn new(name: impl Into<String>, info: ModuleInfo, mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|s| s.address);
        Self { name: name.into(), info, symbols }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base_address(&self) -> u64 {
        self.info.base_address
    }

    #[must_use]
    pub fn size_in_pages(&self) -> u64 {
        self.info.size_in_pages
    }

    #[must_use]
    pub fn info(&self) -> ModuleInfo {
        self.info
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

/// Snapshot of every loaded module at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    modules: Vec<Module>,
    page_size: u64,
}

impl Catalog {
    /// A catalog with no modules: loadable module support is absent or
    /// nothing is loaded
    #[must_use]
    pub fn empty(page_size: u64) -> Self {
        Self { modules: Vec::new(), page_size }
    }

    /// Create a catalog from modules in enumeration order
    #[must_use]
    pub fn from_modules(modules: Vec<Module>, page_size: u64) -> Self {
        Self { modules, page_size }
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Page size used to turn module extents into byte ranges
    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.modules.iter().map(|m| m.symbols.len()).sum()
    }
}

/// Which tier of the lookup produced a [`Resolution`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Address lies between two adjacent symbols; `size` is the true span
    Symbol,
    /// Address lies past the last symbol; `size` runs to the module end
    ModuleTail,
    /// No usable symbol; `matched_name` is the bare module name
    ModuleOnly,
}

/// Result of resolving one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub matched_name: String,
    pub offset: u64,
    pub size: u64,
    pub kind: MatchKind,
}

impl fmt::Display for Resolution {
    /// `name+0x<offset>/0x<size>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+0x{:x}/0x{:x}", self.matched_name, self.offset, self.size)
    }
}
