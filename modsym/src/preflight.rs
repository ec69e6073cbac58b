//! Pre-flight checks for modsym
//!
//! Validates the procfs view of the kernel before building a catalog.
//! Provides clear, actionable messages when addresses will not be usable.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Number of kallsyms lines sampled when checking for hidden addresses
const KALLSYMS_SAMPLE_LINES: usize = 256;

/// Run all pre-flight checks against the procfs at `proc_root`
///
/// # Errors
/// Returns an error if `proc_root` is not a readable directory
pub fn run_preflight_checks(proc_root: &Path, quiet: bool) -> Result<()> {
    check_proc_mounted(proc_root)?;
    if quiet {
        return Ok(());
    }

    let root = is_root();
    if !root {
        eprintln!("warning: not running as root, module addresses may read as zero");
    }
    if kallsyms_hidden(proc_root)? {
        eprintln!(
            "warning: {} shows zero addresses (kernel.kptr_restrict), \
             resolution will not work{}",
            proc_root.join("kallsyms").display(),
            if root { "" } else { "\n         Run with: sudo modsym ..." }
        );
    }
    Ok(())
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Check that the procfs root exists
fn check_proc_mounted(proc_root: &Path) -> Result<()> {
    if !proc_root.is_dir() {
        bail!(
            "{} is not a directory.\n\n\
             Is /proc mounted? Use --proc-root to point at another procfs.",
            proc_root.display()
        );
    }
    Ok(())
}

/// Whether the sampled kallsyms addresses are all zero
///
/// A missing kallsyms file is not reported here; the catalog build will
/// surface it.
fn kallsyms_hidden(proc_root: &Path) -> Result<bool> {
    let path = proc_root.join("kallsyms");
    let Ok(file) = File::open(&path) else {
        return Ok(false);
    };

    let mut seen = 0;
    for line in BufReader::new(file).lines().take(KALLSYMS_SAMPLE_LINES) {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let Some(addr) = line.split_whitespace().next() else {
            continue;
        };
        seen += 1;
        if addr.bytes().any(|b| b != b'0') {
            return Ok(false);
        }
    }
    Ok(seen > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_proc_root() {
        let result = check_proc_mounted(Path::new("/nonexistent/proc"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_hidden_kallsyms_detected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("kallsyms"),
            "0000000000000000 T usb_init\t[usb_core]\n0000000000000000 t probe\t[usb_core]\n",
        )
        .unwrap();
        assert!(kallsyms_hidden(dir.path()).unwrap());
    }

    #[test]
    fn test_visible_kallsyms() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("kallsyms"),
            "0000000000000000 A fixed_percpu_data\nffffffffc0001000 T usb_init\t[usb_core]\n",
        )
        .unwrap();
        assert!(!kallsyms_hidden(dir.path()).unwrap());
    }

    #[test]
    fn test_missing_kallsyms_not_hidden() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!kallsyms_hidden(dir.path()).unwrap());
    }

    #[test]
    fn test_preflight_on_fake_proc() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_preflight_checks(dir.path(), true).is_ok());
    }
}
