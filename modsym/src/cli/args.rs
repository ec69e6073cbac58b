//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "modsym",
    about = "Resolve kernel addresses to loadable module symbols",
    after_help = "\
EXAMPLES:
    sudo modsym dump                              List loaded modules and their symbols
    sudo modsym resolve ffffffffc0a01234          Resolve one address
    sudo modsym dump --json > mods.json           Capture the module set
    modsym --fixture mods.json resolve 0xffffffffc0a01234
    dmesg | sudo modsym watch                     Annotate [<address>] tokens in log lines"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Procfs root to read modules and kallsyms from
    #[arg(long, value_name = "DIR", default_value = "/proc")]
    pub proc_root: PathBuf,

    /// Replay a module set captured with `dump --json` instead of the running kernel
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Keep only global (exported) symbols from kallsyms
    #[arg(long)]
    pub exported_only: bool,

    /// Page size in bytes (defaults to the host page size)
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,

    /// Largest query buffer to allocate, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = crate::catalog::DEFAULT_MAX_BUFFER)]
    pub max_buffer: usize,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print every module and its symbol table
    Dump {
        /// Write the catalog as a JSON fixture instead
        #[arg(long)]
        json: bool,
    },

    /// Resolve one or more hex addresses
    Resolve {
        /// Addresses, with or without 0x prefix
        #[arg(value_name = "ADDR", required = true, value_parser = parse_address)]
        addresses: Vec<u64>,

        /// Demangle Rust symbol names
        #[arg(long)]
        demangle: bool,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Annotate [<address>] tokens in log lines read from stdin; SIGHUP reloads
    Watch {
        /// Demangle Rust symbol names
        #[arg(long)]
        demangle: bool,
    },
}

/// Parse a hex address, with or without `0x`
///
/// # Errors
/// Returns a message if `s` is not a hex number that fits in 64 bits
pub fn parse_address(s: &str) -> Result<u64, String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid address {s:?}: {e}"))
}
