//! In-memory query service backed by a JSON fixture
//!
//! Fixtures use the same format `modsym dump --json` writes, so a module set
//! captured on one machine can be replayed anywhere:
//!
//! ```json
//! {
//!   "page_size": 4096,
//!   "modules": [
//!     {
//!       "name": "usb_core",
//!       "base_address": 4096,
//!       "size_in_pages": 1,
//!       "symbols": [ { "address": 4096, "name": "init" } ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use modsym_common::{encode_name_list, encode_symbol_table, ModuleInfo};

use super::ModuleQuery;
use crate::domain::{FixtureError, QueryError};

/// Serialized module set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    pub modules: Vec<FixtureModule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureModule {
    pub name: String,
    pub base_address: u64,
    pub size_in_pages: u64,
    #[serde(default)]
    pub symbols: Vec<FixtureSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSymbol {
    pub address: u64,
    pub name: String,
}

impl FixtureModule {
    #[must_use]
    pub fn new(name: &str, base_address: u64, size_in_pages: u64) -> Self {
        Self { name: name.to_string(), base_address, size_in_pages, symbols: Vec::new() }
    }

    #[must_use]
    pub fn symbol(mut self, address: u64, name: &str) -> Self {
        self.symbols.push(FixtureSymbol { address, name: name.to_string() });
        self
    }
}

/// [`ModuleQuery`] answering from a [`Fixture`]
///
/// Individual operations can be made to fail, to exercise the builder's
/// abort paths.
#[derive(Debug, Clone, Default)]
pub struct FixtureQuery {
    fixture: Fixture,
    fail_names: bool,
    fail_info: HashSet<String>,
    fail_symbols: HashSet<String>,
}

impl FixtureQuery {
    /// Wrap a fixture after checking it is well formed
    ///
    /// # Errors
    /// Returns an error on duplicate module names or names the raw layout
    /// cannot carry (empty, or containing NUL or `:` in a module name)
    pub fn new(fixture: Fixture) -> Result<Self, FixtureError> {
        let mut seen = HashSet::new();
        for module in &fixture.modules {
            if module.name.is_empty() || module.name.contains(['\0', ':']) {
                return Err(FixtureError::InvalidName(module.name.clone()));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(FixtureError::DuplicateModule(module.name.clone()));
            }
            if let Some(bad) = module.symbols.iter().find(|s| s.name.contains('\0')) {
                return Err(FixtureError::InvalidName(bad.name.clone()));
            }
        }
        Ok(Self { fixture, ..Self::default() })
    }

    /// Build from a list of modules
    ///
    /// # Errors
    /// See [`FixtureQuery::new`]
    pub fn from_modules(modules: Vec<FixtureModule>) -> Result<Self, FixtureError> {
        Self::new(Fixture { page_size: None, modules })
    }

    /// Parse a fixture from JSON text
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or fails validation
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Load a fixture file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Page size recorded in the fixture, if any
    #[must_use]
    pub fn page_size(&self) -> Option<u64> {
        self.fixture.page_size
    }

    /// Make the module name enumeration fail
    #[must_use]
    pub fn failing_names(mut self) -> Self {
        self.fail_names = true;
        self
    }

    /// Make `module_info` fail for `name`
    #[must_use]
    pub fn failing_info(mut self, name: &str) -> Self {
        self.fail_info.insert(name.to_string());
        self
    }

    /// Make `list_module_symbols` fail for `name`
    #[must_use]
    pub fn failing_symbols(mut self, name: &str) -> Self {
        self.fail_symbols.insert(name.to_string());
        self
    }

    fn find(&self, name: &str) -> Result<&FixtureModule, QueryError> {
        self.fixture
            .modules
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| QueryError::NoSuchModule(name.to_string()))
    }
}

impl ModuleQuery for FixtureQuery {
    fn list_module_names(&self, buf: &mut [u8]) -> Result<usize, QueryError> {
        if self.fail_names {
            return Err(QueryError::Unavailable("module enumeration disabled".to_string()));
        }
        let names = self.fixture.modules.iter().map(|m| m.name.as_str());
        encode_name_list(names, buf).map_err(QueryError::NeedsCapacity)
    }

    fn module_info(&self, name: &str) -> Result<ModuleInfo, QueryError> {
        if self.fail_info.contains(name) {
            return Err(QueryError::Unavailable(format!("no info for {name}")));
        }
        let module = self.find(name)?;
        Ok(ModuleInfo { base_address: module.base_address, size_in_pages: module.size_in_pages })
    }

    fn list_module_symbols(&self, name: &str, buf: &mut [u8]) -> Result<usize, QueryError> {
        if self.fail_symbols.contains(name) {
            return Err(QueryError::Unavailable(format!("no symbols for {name}")));
        }
        let module = self.find(name)?;
        let symbols = module.symbols.iter().map(|s| (s.address, s.name.as_str()));
        encode_symbol_table(symbols, buf).map_err(QueryError::NeedsCapacity)
    }
}
