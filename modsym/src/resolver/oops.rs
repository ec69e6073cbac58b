//! Symbolization of kernel fault report lines
//!
//! Oops and call trace lines carry addresses as `[<ffffffffc0a01234>]`.
//! Each such token that resolves against the catalog gets the symbol
//! appended; unresolved tokens are left untouched.
//!
//! ```text
//! in:   Call Trace: [<ffffffffc0a01234>] [<ffffffff81000010>]
//! out:  Call Trace: [<ffffffffc0a01234>] {nf_tables:nft_trans_alloc+0x234/0x400} [<ffffffff81000010>]
//! ```

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::LazyLock;

use super::render::render_resolution;
use crate::domain::Catalog;

static ADDRESS_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[<([0-9a-fA-F]{1,16})>\]").expect("address token pattern is valid")
});

/// Expand every resolvable address token in `line`
#[must_use]
pub fn expand_line<'a>(line: &'a str, catalog: &Catalog, demangle: bool) -> Cow<'a, str> {
    ADDRESS_TOKEN.replace_all(line, |caps: &Captures<'_>| {
        let token = &caps[0];
        let resolved = u64::from_str_radix(&caps[1], 16).ok().and_then(|addr| catalog.resolve(addr));
        match resolved {
            Some(res) => format!("{token} {{{}}}", render_resolution(&res, demangle)),
            None => token.to_string(),
        }
    })
}

/// Write `line` expanded and newline-terminated to `out`
///
/// # Errors
/// Returns the writer's error, including `BrokenPipe` once the reader is gone
pub fn write_expanded<W: Write>(
    out: &mut W,
    line: &str,
    catalog: &Catalog,
    demangle: bool,
) -> io::Result<()> {
    writeln!(out, "{}", expand_line(line, catalog, demangle))
}
