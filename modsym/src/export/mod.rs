//! Catalog export
//!
//! Writes a catalog in the fixture format read by
//! [`FixtureQuery`](crate::query::FixtureQuery), so a module set captured on a
//! live system can be replayed offline with `modsym --fixture`.

use std::io::Write;

use crate::domain::{Catalog, ExportError};
use crate::query::fixture::{Fixture, FixtureModule, FixtureSymbol};

/// Convert a catalog back into fixture form
///
/// Symbol names lose their module prefix, so rebuilding from the fixture
/// yields the same qualified names.
///
/// # Errors
/// Returns an error if a symbol's qualified name does not carry its owning
/// module's prefix
pub fn fixture_from_catalog(catalog: &Catalog) -> Result<Fixture, ExportError> {
    let mut modules = Vec::with_capacity(catalog.module_count());

    for module in catalog.modules() {
        let symbols = module
            .symbols()
            .iter()
            .map(|sym| {
                if sym.module_name() != module.name() {
                    return Err(ExportError::UnqualifiedSymbol(sym.qualified_name.clone()));
                }
                Ok(FixtureSymbol { address: sym.address, name: sym.exported_name().to_string() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        modules.push(FixtureModule {
            name: module.name().to_string(),
            base_address: module.base_address(),
            size_in_pages: module.size_in_pages(),
            symbols,
        });
    }

    Ok(Fixture { page_size: Some(catalog.page_size()), modules })
}

/// Write `catalog` as pretty-printed JSON
///
/// # Errors
/// Returns an error if the catalog cannot be converted or the writer fails
pub fn export_catalog<W: Write>(catalog: &Catalog, mut writer: W) -> Result<(), ExportError> {
    let fixture = fixture_from_catalog(catalog)?;
    serde_json::to_writer_pretty(&mut writer, &fixture)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
