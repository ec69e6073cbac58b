use std::fs;

use modsym::catalog::{build_catalog, BuilderConfig};
use modsym::export::export_catalog;
use modsym::query::{FixtureQuery, ProcfsQuery};
use modsym::resolver::expand_line;
use modsym::{BuildError, MatchKind};

const MODULES: &str = "\
nf_tables 16384 0 - Live 0xffffffffc0a00000
dummy 8192 0 - Live 0xffffffffc0b00000
";

const KALLSYMS: &str = "\
ffffffff81000000 T _stext
ffffffffc0a00400 t nft_trans_alloc\t[nf_tables]
ffffffffc0a00000 T nft_register_expr\t[nf_tables]
ffffffffc0a01800 T nft_chain_validate\t[nf_tables]
";

fn fake_proc() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("modules"), MODULES).expect("write modules");
    fs::write(dir.path().join("kallsyms"), KALLSYMS).expect("write kallsyms");
    dir
}

fn config() -> BuilderConfig {
    BuilderConfig { page_size: 4096, ..BuilderConfig::default() }
}

#[test]
fn test_build_from_procfs() {
    let dir = fake_proc();
    let query = ProcfsQuery::new(dir.path(), 4096);
    let catalog = build_catalog(&query, &config()).expect("build succeeds");

    assert_eq!(catalog.module_count(), 2);
    assert_eq!(catalog.symbol_count(), 3);

    let nf = catalog.module("nf_tables").expect("nf_tables loaded");
    assert_eq!(nf.size_in_pages(), 4);
    assert_eq!(nf.symbols()[0].qualified_name, "nf_tables:nft_register_expr");

    let res = catalog.resolve(0xffff_ffff_c0a0_0410).expect("resolves");
    assert_eq!(res.to_string(), "nf_tables:nft_trans_alloc+0x10/0x1400");

    let res = catalog.resolve(0xffff_ffff_c0b0_0010).expect("resolves");
    assert_eq!(res.kind, MatchKind::ModuleOnly);
    assert_eq!(res.to_string(), "dummy+0x10/0x2000");

    assert_eq!(catalog.resolve(0xffff_ffff_8100_0000), None);
}

#[test]
fn test_empty_modules_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("modules"), "").expect("write modules");
    let catalog = build_catalog(&ProcfsQuery::new(dir.path(), 4096), &config()).expect("build");
    assert!(catalog.is_empty());
}

#[test]
fn test_no_module_support_is_query_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = build_catalog(&ProcfsQuery::new(dir.path(), 4096), &config()).unwrap_err();
    assert!(matches!(err, BuildError::QueryFailed { .. }));
}

#[test]
fn test_missing_kallsyms_aborts_build() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("modules"), MODULES).expect("write modules");
    let err = build_catalog(&ProcfsQuery::new(dir.path(), 4096), &config()).unwrap_err();
    assert!(err.to_string().contains("symbol list for nf_tables"));
}

#[test]
fn test_rebuild_sees_new_module_set() {
    let dir = fake_proc();
    let query = ProcfsQuery::new(dir.path(), 4096);
    assert_eq!(build_catalog(&query, &config()).expect("first build").module_count(), 2);

    fs::write(dir.path().join("modules"), "dummy 8192 0 - Live 0xffffffffc0b00000\n")
        .expect("rewrite modules");
    let catalog = build_catalog(&query, &config()).expect("second build");
    assert_eq!(catalog.module_count(), 1);
    assert!(catalog.module("nf_tables").is_none());
}

#[test]
fn test_exported_json_replays_identically() {
    let dir = fake_proc();
    let live = build_catalog(&ProcfsQuery::new(dir.path(), 4096), &config()).expect("build");

    let mut json = Vec::new();
    export_catalog(&live, &mut json).expect("export");
    let replay = FixtureQuery::from_json(std::str::from_utf8(&json).expect("utf8")).expect("parse");
    let replayed = build_catalog(&replay, &config()).expect("rebuild");

    assert_eq!(live, replayed);
}

#[test]
fn test_expand_oops_line() {
    let dir = fake_proc();
    let catalog = build_catalog(&ProcfsQuery::new(dir.path(), 4096), &config()).expect("build");
    let line = " [<ffffffffc0a01810>] ? [<ffffffff81000010>]";
    assert_eq!(
        expand_line(line, &catalog, false),
        " [<ffffffffc0a01810>] {nf_tables:nft_chain_validate+0x10/0x27f0} ? [<ffffffff81000010>]"
    );
}
