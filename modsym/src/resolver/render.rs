//! Display helpers for resolution results

use rustc_demangle::demangle;

use crate::domain::Resolution;

/// Demangle the symbol half of a `"<module>:<symbol>"` name
///
/// Bare module names and names that are not Rust-mangled come back
/// unchanged.
#[must_use]
pub fn demangle_qualified(name: &str) -> String {
    match name.split_once(':') {
        Some((module, symbol)) => format!("{module}:{:#}", demangle(symbol)),
        None => name.to_string(),
    }
}

/// Format a resolution as `name+0x<offset>/0x<size>`
#[must_use]
pub fn render_resolution(resolution: &Resolution, demangle_names: bool) -> String {
    if demangle_names {
        format!(
            "{}+0x{:x}/0x{:x}",
            demangle_qualified(&resolution.matched_name),
            resolution.offset,
            resolution.size
        )
    } else {
        resolution.to_string()
    }
}
