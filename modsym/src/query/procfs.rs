//! Query service for the running kernel, via procfs
//!
//! Modern kernels no longer offer the buffer-based module query system call,
//! so this service reconstructs its answers from two text files:
//!
//! ```text
//! /proc/modules    name size refcount deps state address [taint]
//!                  nf_tables 327680 0 - Live 0xffffffffc0a00000
//!
//! /proc/kallsyms   address type name [module]
//!                  ffffffffc0a01000 t nft_trans_alloc     [nf_tables]
//! ```
//!
//! Module sizes are reported in bytes and rounded up to whole pages.
//! Symbols without a `[module]` tag belong to the kernel image and are
//! ignored.
//!
//! Each `list_module_names` call re-reads `/proc/modules` and invalidates
//! the cached symbol index, so a new catalog build always sees a consistent
//! module set. `/proc/kallsyms` is read at most once per build.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use modsym_common::{encode_name_list, encode_symbol_table, ModuleInfo};

use super::ModuleQuery;
use crate::domain::QueryError;

/// One line of `/proc/modules`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcModule {
    pub name: String,
    pub size_bytes: u64,
    pub base_address: u64,
}

/// One module-owned line of `/proc/kallsyms`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KallsymsEntry {
    pub address: u64,
    pub kind: char,
    pub name: String,
    pub module: String,
}

impl KallsymsEntry {
    /// Global symbols carry an upper-case type letter
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.kind.is_ascii_uppercase()
    }
}

#[derive(Default)]
struct Snapshot {
    modules: Option<Vec<ProcModule>>,
    symbols: Option<HashMap<String, Vec<(u64, String)>>>,
}

/// [`ModuleQuery`] over `/proc/modules` and `/proc/kallsyms`
pub struct ProcfsQuery {
    root: PathBuf,
    page_size: u64,
    exported_only: bool,
    snapshot: Mutex<Snapshot>,
}

impl ProcfsQuery {
    /// Query the procfs mounted at `root` (normally `/proc`)
    pub fn new<P: AsRef<Path>>(root: P, page_size: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            page_size: page_size.max(1),
            exported_only: false,
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    /// Keep only global symbols (upper-case kallsyms type)
    #[must_use]
    pub fn exported_only(mut self, exported_only: bool) -> Self {
        self.exported_only = exported_only;
        self
    }

    fn modules_path(&self) -> PathBuf {
        self.root.join("modules")
    }

    fn kallsyms_path(&self) -> PathBuf {
        self.root.join("kallsyms")
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_modules(&self) -> Result<Vec<ProcModule>, QueryError> {
        let path = self.modules_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QueryError::Unavailable(format!(
                    "{} not found, kernel has no loadable module support",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_proc_modules(&content)?)
    }

    fn read_symbols(&self) -> Result<HashMap<String, Vec<(u64, String)>>, QueryError> {
        let path = self.kallsyms_path();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut by_module: HashMap<String, Vec<(u64, String)>> = HashMap::new();
        let mut kept = 0usize;
        for entry in parse_kallsyms(&content)? {
            if self.exported_only && !entry.is_global() {
                continue;
            }
            kept += 1;
            by_module.entry(entry.module).or_default().push((entry.address, entry.name));
        }
        info!("Indexed {} module symbols from {}", kept, path.display());
        Ok(by_module)
    }

    fn with_module<T>(
        &self,
        name: &str,
        f: impl FnOnce(&ProcModule) -> T,
    ) -> Result<T, QueryError> {
        let mut snapshot = self.lock();
        if snapshot.modules.is_none() {
            snapshot.modules = Some(self.read_modules()?);
        }
        snapshot
            .modules
            .iter()
            .flatten()
            .find(|m| m.name == name)
            .map(f)
            .ok_or_else(|| QueryError::NoSuchModule(name.to_string()))
    }
}

impl ModuleQuery for ProcfsQuery {
    fn list_module_names(&self, buf: &mut [u8]) -> Result<usize, QueryError> {
        let modules = self.read_modules()?;
        let result = encode_name_list(modules.iter().map(|m| m.name.as_str()), buf)
            .map_err(QueryError::NeedsCapacity);

        let mut snapshot = self.lock();
        snapshot.modules = Some(modules);
        snapshot.symbols = None;
        result
    }

    fn module_info(&self, name: &str) -> Result<ModuleInfo, QueryError> {
        let page_size = self.page_size;
        self.with_module(name, |m| ModuleInfo {
            base_address: m.base_address,
            size_in_pages: m.size_bytes.div_ceil(page_size),
        })
    }

    fn list_module_symbols(&self, name: &str, buf: &mut [u8]) -> Result<usize, QueryError> {
        self.with_module(name, |_| ())?;

        let mut snapshot = self.lock();
        if snapshot.symbols.is_none() {
            snapshot.symbols = Some(self.read_symbols()?);
        }
        let symbols = snapshot.symbols.as_ref().and_then(|s| s.get(name));
        let entries = symbols.into_iter().flatten().map(|(addr, sym)| (*addr, sym.as_str()));
        let count = encode_symbol_table(entries, buf).map_err(QueryError::NeedsCapacity)?;
        debug!("{name}: {count} symbols");
        Ok(count)
    }
}

/// Parse the contents of `/proc/modules`
///
/// # Errors
/// Returns an error if a line has fewer than two fields or a numeric field
/// does not parse
pub fn parse_proc_modules(content: &str) -> Result<Vec<ProcModule>> {
    let mut modules = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() < 2 {
            bail!("Malformed /proc/modules line {}: {line:?}", lineno + 1);
        }

        let size_bytes = parts[1]
            .parse::<u64>()
            .with_context(|| format!("Bad module size on line {}", lineno + 1))?;

        // Older kernels stop after the state column
        let base_address = match parts.get(5) {
            Some(addr) => parse_hex(addr)
                .with_context(|| format!("Bad module address on line {}", lineno + 1))?,
            None => 0,
        };

        modules.push(ProcModule { name: parts[0].to_string(), size_bytes, base_address });
    }

    Ok(modules)
}

/// Parse the module-owned entries of `/proc/kallsyms`
///
/// # Errors
/// Returns an error if an address field does not parse
pub fn parse_kallsyms(content: &str) -> Result<Vec<KallsymsEntry>> {
    let mut entries = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let (Some(addr), Some(kind), Some(name), Some(tag)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            // Kernel image symbol, or a blank line
            continue;
        };
        let Some(module) = tag.strip_prefix('[').and_then(|t| t.strip_suffix(']')) else {
            continue;
        };

        let address =
            parse_hex(addr).with_context(|| format!("Bad kallsyms address on line {}", lineno + 1))?;

        entries.push(KallsymsEntry {
            address,
            kind: kind.chars().next().unwrap_or('?'),
            name: name.to_string(),
            module: module.to_string(),
        });
    }

    Ok(entries)
}

fn parse_hex(field: &str) -> Result<u64> {
    let digits = field.strip_prefix("0x").unwrap_or(field);
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hex value {field:?}"))
}
