//! Catalog construction
//!
//! Builds a complete [`Catalog`] from a [`ModuleQuery`] or fails as a whole.
//! All intermediate state is local to [`build_catalog`]; nothing is visible
//! to resolvers until the finished catalog is returned.

#![allow(unsafe_code)] // sysconf() requires unsafe

use log::{debug, info, warn};

use modsym_common::{
    decode_name_list, decode_symbol_table, ModuleInfo, DEFAULT_PAGE_SIZE, NAMES_SEED, SYMBOLS_SEED,
};

use crate::domain::{BuildError, Catalog, Module, QueryError, Symbol};
use crate::query::{query_with_retry, ModuleQuery};

/// Ceiling on any single query buffer
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024 * 1024;

/// Tuning knobs for catalog construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Initial buffer size for the module name list
    pub names_seed: usize,
    /// Initial buffer size for each module's symbol table
    pub symbols_seed: usize,
    /// Largest buffer the builder will allocate for one query
    pub max_buffer: usize,
    /// Page size used to turn module extents into byte ranges
    pub page_size: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            names_seed: NAMES_SEED,
            symbols_seed: SYMBOLS_SEED,
            max_buffer: DEFAULT_MAX_BUFFER,
            page_size: host_page_size(),
        }
    }
}

/// Page size of the running system, or [`DEFAULT_PAGE_SIZE`] if unknown
#[must_use]
pub fn host_page_size() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size).ok().filter(|&s| s > 0).unwrap_or(DEFAULT_PAGE_SIZE)
}

/// A module whose symbols have been collected but not yet sorted
struct PendingModule {
    name: String,
    info: ModuleInfo,
    symbols: Vec<Symbol>,
}

/// Build a catalog of every loaded module and its exported symbols
///
/// Zero loaded modules is not an error and yields an empty catalog. Any
/// failure to enumerate modules, describe a module, or list its symbols
/// aborts the whole build.
///
/// # Errors
/// - [`BuildError::QueryFailed`] if the query service reports anything other
///   than "buffer too small"
/// - [`BuildError::AllocationFailed`] if a result buffer cannot grow large
///   enough
pub fn build_catalog(
    query: &dyn ModuleQuery,
    config: &BuilderConfig,
) -> Result<Catalog, BuildError> {
    let names = list_modules(query, config)?;

    if names.is_empty() {
        info!("No module symbols loaded - modules disabled?");
        return Ok(Catalog::empty(config.page_size));
    }
    debug!("Loading kernel module symbols - {} modules", names.len());

    let mut pending = Vec::with_capacity(names.len());
    for name in names {
        let info = query.module_info(&name).map_err(|source| {
            warn!("Error reading module info for {name}: {source}");
            BuildError::query(format!("module info for {name}"), source)
        })?;

        let symbols = list_symbols(query, &name, config).inspect_err(|e| {
            warn!("Error loading symbols for {name}: {e}");
        })?;

        debug!(
            "Module {name}: base 0x{:x}, {} pages, {} symbols",
            info.base_address,
            info.size_in_pages,
            symbols.len()
        );
        pending.push(PendingModule { name, info, symbols });
    }

    let modules: Vec<Module> =
        pending.into_iter().map(|p| Module::new(p.name, p.info, p.symbols)).collect();
    let catalog = Catalog::from_modules(modules, config.page_size);

    let symbols = catalog.symbol_count();
    let count = catalog.module_count();
    if symbols == 0 {
        info!("No module symbols loaded.");
    } else {
        info!(
            "Loaded {} {} from {} module{}",
            symbols,
            if symbols == 1 { "symbol" } else { "symbols" },
            count,
            if count == 1 { "." } else { "s." }
        );
    }

    Ok(catalog)
}

/// Names of all loaded modules, in enumeration order
fn list_modules(query: &dyn ModuleQuery, config: &BuilderConfig) -> Result<Vec<String>, BuildError> {
    let what = "loaded modules";
    let buf = query_with_retry(what, config.names_seed, config.max_buffer, |b| {
        query.list_module_names(b)
    })?;

    decode_name_list(&buf.bytes, buf.count)
        .map(|name| {
            name.map(str::to_string).map_err(|e| BuildError::query(what, QueryError::from(e)))
        })
        .collect()
}

/// Symbols of one module, qualified with its name, in enumeration order
fn list_symbols(
    query: &dyn ModuleQuery,
    module: &str,
    config: &BuilderConfig,
) -> Result<Vec<Symbol>, BuildError> {
    let what = format!("symbol list for {module}");
    let buf = query_with_retry(&what, config.symbols_seed, config.max_buffer, |b| {
        query.list_module_symbols(module, b)
    })?;

    decode_symbol_table(&buf.bytes, buf.count)
        .map(|entry| {
            entry
                .map(|(address, name)| Symbol::new(module, name, address))
                .map_err(|e| BuildError::query(what.as_str(), QueryError::from(e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixture::{FixtureModule, FixtureQuery};
    use modsym_common::encode_name_list;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> BuilderConfig {
        BuilderConfig { page_size: 4096, ..BuilderConfig::default() }
    }

    fn usb_core() -> FixtureModule {
        FixtureModule::new("usb_core", 0x1000, 1).symbol(0x1200, "probe").symbol(0x1000, "init")
    }

    /// Answers "needs more" until the buffer reaches `threshold`
    struct Stingy {
        threshold: usize,
        calls: AtomicUsize,
    }

    impl ModuleQuery for Stingy {
        fn list_module_names(&self, buf: &mut [u8]) -> Result<usize, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if buf.len() < self.threshold {
                return Err(QueryError::NeedsCapacity(buf.len() + 1));
            }
            encode_name_list(["stingy"], buf).map_err(QueryError::NeedsCapacity)
        }

        fn module_info(&self, _name: &str) -> Result<ModuleInfo, QueryError> {
            Ok(ModuleInfo { base_address: 0x4000, size_in_pages: 1 })
        }

        fn list_module_symbols(&self, _name: &str, _buf: &mut [u8]) -> Result<usize, QueryError> {
            Ok(0)
        }
    }

    #[test]
    fn test_builds_sorted_qualified_tables() {
        let query = FixtureQuery::from_modules(vec![usb_core()]).unwrap();
        let catalog = build_catalog(&query, &config()).unwrap();

        let module = catalog.module("usb_core").unwrap();
        let names: Vec<&str> = module.symbols().iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["usb_core:init", "usb_core:probe"]);
        assert_eq!(module.base_address(), 0x1000);
        assert_eq!(module.size_in_pages(), 1);
    }

    #[test]
    fn test_zero_modules_is_empty_catalog() {
        let query = FixtureQuery::default();
        let catalog = build_catalog(&query, &config()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.page_size(), 4096);
    }

    #[test]
    fn test_module_without_symbols_is_kept() {
        let query = FixtureQuery::from_modules(vec![FixtureModule::new("dummy", 0x8000, 2)]).unwrap();
        let catalog = build_catalog(&query, &config()).unwrap();
        assert_eq!(catalog.module_count(), 1);
        assert!(catalog.modules()[0].symbols().is_empty());
    }

    #[test]
    fn test_growth_retry_is_satisfied() {
        let query = Stingy { threshold: 1000, calls: AtomicUsize::new(0) };
        let catalog = build_catalog(&query, &config()).unwrap();
        assert_eq!(catalog.module_count(), 1);
        // 32, 64, 128, 256, 512, 1024
        assert_eq!(query.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_names_failure_aborts() {
        let query = FixtureQuery::from_modules(vec![usb_core()]).unwrap().failing_names();
        let err = build_catalog(&query, &config()).unwrap_err();
        assert!(matches!(err, BuildError::QueryFailed { .. }));
    }

    #[test]
    fn test_info_failure_aborts_whole_build() {
        let query = FixtureQuery::from_modules(vec![usb_core(), FixtureModule::new("ext4", 0x9000, 4)])
            .unwrap()
            .failing_info("ext4");
        let err = build_catalog(&query, &config()).unwrap_err();
        assert!(err.to_string().contains("module info for ext4"));
    }

    #[test]
    fn test_symbol_failure_aborts_whole_build() {
        let query = FixtureQuery::from_modules(vec![usb_core(), FixtureModule::new("ext4", 0x9000, 4)])
            .unwrap()
            .failing_symbols("usb_core");
        let err = build_catalog(&query, &config()).unwrap_err();
        assert!(err.to_string().contains("symbol list for usb_core"));
    }

    #[test]
    fn test_buffer_ceiling_is_allocation_failure() {
        let query = Stingy { threshold: usize::MAX, calls: AtomicUsize::new(0) };
        let cfg = BuilderConfig { max_buffer: 4096, ..config() };
        let err = build_catalog(&query, &cfg).unwrap_err();
        assert!(matches!(err, BuildError::AllocationFailed { .. }));
    }

    #[test]
    fn test_small_symbol_seed_still_loads_everything() {
        let mut module = FixtureModule::new("big", 0x10_0000, 16);
        for i in 0..100u64 {
            module = module.symbol(0x10_0000 + i * 0x40, &format!("fn_{i}"));
        }
        let query = FixtureQuery::from_modules(vec![module]).unwrap();
        let cfg = BuilderConfig { symbols_seed: 8, ..config() };
        let catalog = build_catalog(&query, &cfg).unwrap();
        assert_eq!(catalog.symbol_count(), 100);
    }

    #[test]
    fn test_host_page_size_is_power_of_two() {
        assert!(host_page_size().is_power_of_two());
    }
}
