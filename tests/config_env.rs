use std::sync::Arc;

use anyhow::Result;

use QuiverSeg::{MmapBudget, MmapConfig};

#[test]
fn from_env_reads_p1_mmap_vars() -> Result<()> {
    std::env::set_var("P1_MMAP_IGNORE_ERRORS", "yes");
    std::env::set_var("P1_MMAP_MAX_BYTES", " 1048576 ");
    std::env::set_var("P1_MMAP_ON_OPEN", "1");
    std::env::set_var("P1_SEG_LOCK_SHARED", "off");

    let cfg = MmapConfig::from_env();
    assert!(cfg.ignore_mmap_errors);
    assert_eq!(cfg.max_mmap_bytes, 1 << 20);
    assert!(cfg.mmap_on_open);
    assert!(!cfg.lock_shared);

    // builder wins over env
    let cfg = cfg.with_max_mmap_bytes(0).with_ignore_mmap_errors(false);
    let budget = MmapBudget::from_config(&cfg);
    assert_eq!(budget.max_bytes(), 0);
    assert!(!budget.ignore_errors());

    // garbage is ignored, default kept
    std::env::set_var("P1_MMAP_MAX_BYTES", "lots");
    assert_eq!(MmapConfig::from_env().max_mmap_bytes, 0);

    // the process budget is one shared instance
    let a = MmapBudget::process();
    let b = MmapBudget::process();
    assert!(Arc::ptr_eq(&a, &b));

    // command-line overrides go through the runtime setters and reach every holder
    let cli = MmapConfig::default()
        .with_max_mmap_bytes(4096)
        .with_ignore_mmap_errors(true);
    a.set_max_bytes(cli.max_mmap_bytes);
    a.set_ignore_errors(cli.ignore_mmap_errors);
    assert_eq!(b.max_bytes(), 4096);
    assert!(b.ignore_errors());
    assert!(b.would_exceed(4097));

    for k in [
        "P1_MMAP_IGNORE_ERRORS",
        "P1_MMAP_MAX_BYTES",
        "P1_MMAP_ON_OPEN",
        "P1_SEG_LOCK_SHARED",
    ] {
        std::env::remove_var(k);
    }
    Ok(())
}
