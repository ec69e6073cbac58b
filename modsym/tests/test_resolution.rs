use modsym::catalog::{build_catalog, BuilderConfig};
use modsym::query::fixture::{FixtureModule, FixtureQuery};
use modsym::{Catalog, MatchKind};

fn config() -> BuilderConfig {
    BuilderConfig { page_size: 4096, ..BuilderConfig::default() }
}

fn build(modules: Vec<FixtureModule>) -> Catalog {
    let query = FixtureQuery::from_modules(modules).expect("valid fixture");
    build_catalog(&query, &config()).expect("build succeeds")
}

fn sample() -> Catalog {
    build(vec![
        FixtureModule::new("usb_core", 0x1000, 1).symbol(0x1200, "probe").symbol(0x1000, "init"),
        FixtureModule::new("nf_tables", 0x10_000, 4)
            .symbol(0x10_400, "nft_trans_alloc")
            .symbol(0x10_000, "nft_register_expr")
            .symbol(0x11_800, "nft_chain_validate"),
        FixtureModule::new("dummy", 0x20_000, 2),
    ])
}

#[test]
fn test_usb_core_example() {
    let catalog = sample();

    let hit = catalog.resolve(0x1100).expect("resolves");
    assert_eq!(hit.to_string(), "usb_core:init+0x100/0x200");

    let tail = catalog.resolve(0x1300).expect("resolves");
    assert_eq!(tail.to_string(), "usb_core:probe+0x100/0xd00");

    assert_eq!(catalog.resolve(0x2000), None);
}

#[test]
fn test_symbols_sorted_after_build() {
    let catalog = sample();
    for module in catalog.modules() {
        let syms = module.symbols();
        assert!(syms.windows(2).all(|w| w[0].address <= w[1].address), "{} unsorted", module.name());
    }
}

#[test]
fn test_qualified_names() {
    let catalog = sample();
    for module in catalog.modules() {
        for sym in module.symbols() {
            let prefix = format!("{}:", module.name());
            assert!(sym.qualified_name.starts_with(&prefix));
            assert!(!sym.exported_name().starts_with(&prefix), "double prefix on {}", sym.qualified_name);
        }
    }
}

#[test]
fn test_bracket_for_every_address_between_symbols() {
    let catalog = sample();
    let module = catalog.module("nf_tables").expect("module present");
    let syms = module.symbols();

    for pair in syms.windows(2) {
        for addr in (pair[0].address..pair[1].address).step_by(0x40) {
            let res = catalog.resolve(addr).expect("resolves");
            assert_eq!(res.kind, MatchKind::Symbol);
            assert_eq!(res.matched_name, pair[0].qualified_name);
            assert_eq!(res.offset, addr - pair[0].address);
            assert_eq!(res.size, pair[1].address - pair[0].address);
        }
    }
}

#[test]
fn test_tail_fallback() {
    let catalog = sample();
    // nf_tables spans 0x10000..0x14000, last symbol at 0x11800
    let res = catalog.resolve(0x13_fff).expect("resolves");
    assert_eq!(res.kind, MatchKind::ModuleTail);
    assert_eq!(res.matched_name, "nf_tables:nft_chain_validate");
    assert_eq!(res.offset, 0x13_fff - 0x11_800);
    assert_eq!(res.size, 1);

    assert_eq!(catalog.resolve(0x14_000), None);
}

#[test]
fn test_module_without_symbols() {
    let catalog = sample();
    let res = catalog.resolve(0x21_000).expect("resolves");
    assert_eq!(res.kind, MatchKind::ModuleOnly);
    assert_eq!(res.matched_name, "dummy");
    assert_eq!(res.offset, 0x1000);
    assert_eq!(res.size, 0x2000);
}

#[test]
fn test_empty_catalog() {
    let catalog = build(Vec::new());
    assert!(catalog.is_empty());
    for addr in [0, 0x1000, 0xffff_ffff_c000_0000, u64::MAX] {
        assert_eq!(catalog.resolve(addr), None);
    }
}

#[test]
fn test_result_outlives_catalog() {
    let res = {
        let catalog = sample();
        catalog.resolve(0x1100).expect("resolves")
    };
    assert_eq!(res.matched_name, "usb_core:init");
}
