//! # modsym - Main Entry Point
//!
//! Builds the module catalog once, then runs one of three commands:
//! - **dump**: print the catalog (or write it as a JSON fixture)
//! - **resolve**: resolve addresses given on the command line
//! - **watch**: annotate kernel log lines from stdin, rebuilding on `SIGHUP`

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::{self, Write};
use std::sync::Arc;

use modsym::catalog::{build_catalog, BuilderConfig, CatalogHandle, ReloadGate};
use modsym::cli::{Args, Command};
use modsym::domain::Catalog;
use modsym::export::export_catalog;
use modsym::preflight::run_preflight_checks;
use modsym::query::{FixtureQuery, ModuleQuery, ProcfsQuery};
use modsym::resolver::{render_resolution, write_expanded};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

/// Pick the query service and builder settings from CLI arguments.
///
/// A fixture replaces the running kernel entirely; its recorded page size
/// applies unless `--page-size` overrides it.
fn open_query(args: &Args) -> Result<(Arc<dyn ModuleQuery>, BuilderConfig)> {
    let mut config = BuilderConfig { max_buffer: args.max_buffer, ..BuilderConfig::default() };

    if let Some(ref path) = args.fixture {
        let query = FixtureQuery::load(path)
            .with_context(|| format!("Failed to load fixture {}", path.display()))?;
        if let Some(page_size) = args.page_size.or(query.page_size()) {
            config.page_size = page_size;
        }
        return Ok((Arc::new(query), config));
    }

    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    run_preflight_checks(&args.proc_root, args.quiet)?;
    let query =
        ProcfsQuery::new(&args.proc_root, config.page_size).exported_only(args.exported_only);
    Ok((Arc::new(query), config))
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let (query, config) = open_query(&args)?;

    let catalog = build_catalog(query.as_ref(), &config).context("Cannot load module symbols")?;

    match args.command {
        Command::Dump { json } => dump(&catalog, json),
        Command::Resolve { addresses, demangle, json } => {
            resolve_addresses(&catalog, &addresses, demangle, json)
        }
        Command::Watch { demangle } => {
            watch(CatalogHandle::new(catalog), query, config, demangle, args.quiet).await
        }
    }
}

fn dump(catalog: &Catalog, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        return export_catalog(catalog, out).context("Failed to write catalog");
    }

    writeln!(
        out,
        "modules: {}, symbols: {}, page size: {}",
        catalog.module_count(),
        catalog.symbol_count(),
        catalog.page_size()
    )?;
    for (idx, module) in catalog.modules().iter().enumerate() {
        writeln!(
            out,
            "\n#{:<3} {} base 0x{:016x}, {} pages, {} symbols",
            idx + 1,
            module.name(),
            module.base_address(),
            module.size_in_pages(),
            module.symbols().len()
        )?;
        for sym in module.symbols() {
            writeln!(out, "     0x{:016x} {}", sym.address, sym.qualified_name)?;
        }
    }
    Ok(())
}

fn resolve_addresses(catalog: &Catalog, addresses: &[u64], demangle: bool, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for &addr in addresses {
        let resolution = catalog.resolve(addr);
        if json {
            let line = serde_json::json!({ "address": addr, "resolution": resolution });
            writeln!(out, "{line}")?;
            continue;
        }
        match resolution {
            Some(res) => writeln!(out, "0x{addr:016x} {}", render_resolution(&res, demangle))?,
            None => writeln!(out, "0x{addr:016x} <unresolved>")?,
        }
    }
    Ok(())
}

/// Annotate stdin until EOF or Ctrl+C.
///
/// `SIGHUP` starts a rebuild on the blocking pool. Lines keep resolving
/// against the previous catalog until the new one is published; a failed
/// rebuild keeps the previous catalog. Hangups arriving while a rebuild is
/// running queue one more rebuild after it. A closed stdout ends the loop.
async fn watch(
    handle: CatalogHandle,
    query: Arc<dyn ModuleQuery>,
    config: BuilderConfig,
    demangle: bool,
    quiet: bool,
) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let gate = ReloadGate::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    if !quiet {
        eprintln!(
            "watching stdin: {} modules, {} symbols (SIGHUP reloads)",
            handle.snapshot().module_count(),
            handle.snapshot().symbol_count()
        );
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let catalog = handle.snapshot();
                match write_expanded(&mut io::stdout().lock(), &line, &catalog, demangle) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break,
                    Err(e) => return Err(e).context("Failed to write stdout"),
                }
            }
            _ = hangup.recv() => {
                if !gate.request() {
                    info!("Reload in progress, queued another after it");
                    continue;
                }
                info!("SIGHUP received, rebuilding module catalog");

                let handle = handle.clone();
                let query = Arc::clone(&query);
                let config = config.clone();
                let gate = gate.clone();
                tokio::task::spawn_blocking(move || {
                    gate.drain(|| match handle.rebuild(query.as_ref(), &config) {
                        Ok(catalog) => info!(
                            "Reloaded {} modules, {} symbols",
                            catalog.module_count(),
                            catalog.symbol_count()
                        ),
                        Err(e) => warn!("Reload failed, keeping previous catalog: {e}"),
                    });
                });
            }
            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    Ok(())
}
