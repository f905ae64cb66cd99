mod common;

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::Result;
use fs2::FileExt;

use common::{pattern, unique_root, write_segment, FlakyMapper};
use QuiverSeg::{stats, MemOwner, MmapBudget, MmapConfig, MmapOwner, OffsetOwner, Segment};

#[test]
fn load_twice_keeps_one_view_and_counts_once() -> Result<()> {
    let root = unique_root("load-twice");
    let data = pattern(8192, 1);
    let p = write_segment(&root, "seg-0001.zap", &data)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let mapper = FlakyMapper::new();
    let seg = Segment::open_with_mapper(&p, budget.clone(), &MmapConfig::default(), mapper.clone())?;

    assert!(!seg.is_mapped(), "open must be lazy by default");
    assert_eq!(budget.current_bytes(), 0);

    seg.load_mmap()?;
    let a = seg.read_mm(0, 16)?;
    seg.load_mmap()?;
    let b = seg.read_mm(0, 16)?;

    assert!(seg.is_mapped());
    assert_eq!(mapper.calls(), 1, "second load must not remap");
    assert_eq!(budget.current_bytes(), 8192, "second load must not double count");
    assert!(a.is_mapped() && b.is_mapped());
    assert_eq!(a.as_ptr(), b.as_ptr(), "both reads must come from the same view");
    Ok(())
}

#[test]
fn unload_on_unmapped_is_noop() -> Result<()> {
    let root = unique_root("unload-noop");
    let p = write_segment(&root, "seg.zap", &pattern(4096, 2))?;

    let budget = Arc::new(MmapBudget::unlimited());
    let seg = Segment::open(&p, budget.clone(), &MmapConfig::default())?;

    seg.unload_mmap()?;
    seg.unload_mmap()?;
    assert_eq!(budget.current_bytes(), 0);
    assert!(!seg.is_mapped());

    seg.load_mmap()?;
    assert_eq!(budget.current_bytes(), 4096);
    seg.unload_mmap()?;
    seg.unload_mmap()?;
    assert_eq!(budget.current_bytes(), 0);
    Ok(())
}

#[test]
fn segment_cycles_between_states() -> Result<()> {
    let root = unique_root("cycle");
    let data = pattern(10_000, 3);
    let p = write_segment(&root, "seg.zap", &data)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let mapper = FlakyMapper::new();
    let seg = Segment::open_with_mapper(&p, budget.clone(), &MmapConfig::default(), mapper.clone())?;

    for round in 0..5 {
        seg.load_mmap()?;
        assert!(seg.is_mapped());
        assert_eq!(budget.current_bytes(), 10_000);
        let got = seg.read_mm(100, 200)?;
        assert!(got.is_mapped());
        assert_eq!(&got[..], &data[100..200], "round {}", round);
        drop(got);

        seg.unload_mmap()?;
        assert!(!seg.is_mapped());
        assert_eq!(stats(&budget).mmap_current_bytes, 0);

        let got = seg.read_mm(100, 200)?;
        assert!(!got.is_mapped(), "after unload reads use file I/O");
        assert_eq!(&got[..], &data[100..200]);
    }
    assert_eq!(mapper.calls(), 5);
    Ok(())
}

#[test]
fn first_read_maps_lazily_once() -> Result<()> {
    let root = unique_root("lazy");
    let data = pattern(4096, 4);
    let p = write_segment(&root, "seg.zap", &data)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let mapper = FlakyMapper::new();
    let seg = Segment::open_with_mapper(&p, budget.clone(), &MmapConfig::default(), mapper.clone())?;

    let got = seg.read_mm(10, 20)?;
    assert!(got.is_mapped(), "first touch maps the segment");
    assert_eq!(budget.current_bytes(), 4096);

    seg.unload_mmap()?;
    let again = seg.read_mm(10, 20)?;
    assert!(!again.is_mapped(), "explicit unload is not undone by later reads");
    assert_eq!(&again[..], &got[..]);
    assert_eq!(mapper.calls(), 1);
    Ok(())
}

#[test]
fn lazy_mapping_can_be_switched_off() -> Result<()> {
    let root = unique_root("no-lazy");
    let data = pattern(2048, 5);
    let p = write_segment(&root, "seg.zap", &data)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let seg = Segment::open(&p, budget.clone(), &MmapConfig::default())?;
    seg.set_lazy_mmap(false);

    let got = seg.read_mm(0, 2048)?;
    assert!(!got.is_mapped());
    assert_eq!(&got[..], &data[..]);
    assert_eq!(budget.current_bytes(), 0);

    seg.mmap_hint();
    assert!(seg.is_mapped());
    Ok(())
}

#[test]
fn mmap_on_open_prewarms() -> Result<()> {
    let root = unique_root("on-open");
    let p = write_segment(&root, "seg.zap", &pattern(3000, 6))?;

    let budget = Arc::new(MmapBudget::unlimited());
    let cfg = MmapConfig::default().with_mmap_on_open(true);
    let seg = Segment::open(&p, budget.clone(), &cfg)?;
    assert!(seg.is_mapped());
    assert_eq!(budget.current_bytes(), 3000);
    Ok(())
}

#[test]
fn close_and_drop_release_budget() -> Result<()> {
    let root = unique_root("close");
    let p1 = write_segment(&root, "a.zap", &pattern(1000, 7))?;
    let p2 = write_segment(&root, "b.zap", &pattern(2000, 8))?;

    let budget = Arc::new(MmapBudget::unlimited());
    let cfg = MmapConfig::default();
    let s1 = Segment::open(&p1, budget.clone(), &cfg)?;
    let s2 = Segment::open(&p2, budget.clone(), &cfg)?;
    s1.load_mmap()?;
    s2.load_mmap()?;
    assert_eq!(budget.current_bytes(), 3000);

    s1.close()?;
    assert_eq!(budget.current_bytes(), 2000);

    drop(s2);
    assert_eq!(budget.current_bytes(), 0);
    Ok(())
}

#[test]
fn slice_outlives_unload() -> Result<()> {
    let root = unique_root("outlive");
    let data = pattern(4096, 9);
    let p = write_segment(&root, "seg.zap", &data)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let seg = Segment::open(&p, budget.clone(), &MmapConfig::default())?;
    seg.load_mmap()?;

    let held = seg.read_mm(1000, 1100)?;
    seg.unload_mmap()?;
    assert_eq!(budget.current_bytes(), 0, "segment gave up its claim");
    assert_eq!(&held[..], &data[1000..1100], "held slice still readable");
    Ok(())
}

#[test]
fn empty_segment_never_maps() -> Result<()> {
    let root = unique_root("empty");
    let p = write_segment(&root, "empty.zap", &[])?;

    let budget = Arc::new(MmapBudget::unlimited());
    let seg = Segment::open(&p, budget.clone(), &MmapConfig::default())?;
    seg.load_mmap()?;
    assert!(!seg.is_mapped());
    assert!(seg.read_mm(0, 0)?.is_empty());
    assert_eq!(budget.current_bytes(), 0);
    Ok(())
}

#[test]
fn delegated_segment_forwards_reads() -> Result<()> {
    let owner = Arc::new(MemOwner::new(b"0123456789abcdef".to_vec()));
    let seg = Segment::delegated(owner.clone(), owner.len());

    assert!(seg.is_delegated());
    assert_eq!(&seg.read_mm(4, 8)?[..], b"4567");

    // no mapping of its own
    seg.load_mmap()?;
    seg.mmap_hint();
    seg.unload_mmap()?;
    assert!(!seg.is_mapped());

    // forwarded unchanged: range errors come from the owner
    assert!(seg.read_mm(10, 40).is_err());
    Ok(())
}

#[test]
fn delegated_to_file_segment_shares_its_mapping() -> Result<()> {
    let root = unique_root("stacked");
    let data = pattern(8192, 10);
    let p = write_segment(&root, "base.zap", &data)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let base = Arc::new(Segment::open(&p, budget.clone(), &MmapConfig::default())?);
    base.load_mmap()?;

    // window [4096, 8192) of the base file
    let window: Arc<dyn MmapOwner> = Arc::new(OffsetOwner::new(base.clone(), 4096, 4096));
    let seg = Segment::delegated(window, 4096);

    let got = seg.read_mm(0, 64)?;
    assert!(got.is_mapped(), "served by the base segment's view");
    assert_eq!(&got[..], &data[4096..4160]);
    assert_eq!(budget.current_bytes(), 8192, "delegation must not map again");
    assert!(seg.read_mm(0, 4097).is_err());
    Ok(())
}

#[cfg(unix)]
#[test]
fn lock_shared_blocks_exclusive_lockers() -> Result<()> {
    let root = unique_root("lock");
    let p = write_segment(&root, "seg.zap", &pattern(512, 11))?;

    let budget = Arc::new(MmapBudget::unlimited());
    let cfg = MmapConfig::default().with_lock_shared(true);
    let seg = Segment::open(&p, budget.clone(), &cfg)?;

    let other = OpenOptions::new().read(true).write(true).open(&p)?;
    assert!(
        FileExt::try_lock_exclusive(&other).is_err(),
        "writer must not get an exclusive lock while the segment is open"
    );

    // a second reader is fine
    let reader2 = Segment::open(&p, budget.clone(), &cfg)?;
    drop(reader2);

    drop(seg);
    FileExt::try_lock_exclusive(&other)?;
    FileExt::unlock(&other)?;
    Ok(())
}

#[test]
fn file_io_segment_ignores_mmap_on_open() -> Result<()> {
    let root = unique_root("file-io");
    let data = pattern(4096, 9);
    let p = write_segment(&root, "seg.zap", &data)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let cfg = MmapConfig::default().with_mmap_on_open(true);

    let mapped = Segment::open(&p, budget.clone(), &cfg)?;
    assert!(mapped.is_mapped());
    let direct = Segment::open_file_io(&p, budget.clone(), &cfg)?;
    assert!(!direct.is_mapped(), "no pre-warm for a file I/O segment");

    let a = mapped.read_mm(100, 4000)?;
    let b = direct.read_mm(100, 4000)?;
    assert!(a.is_mapped());
    assert!(!b.is_mapped(), "reads bypass the mapping");
    assert_eq!(&a[..], &b[..]);
    assert!(!direct.is_mapped(), "first touch does not map either");
    assert_eq!(budget.current_bytes(), 4096, "only the mapped segment is accounted");

    // an explicit load still works
    direct.load_mmap()?;
    assert!(direct.is_mapped());
    assert_eq!(budget.current_bytes(), 8192);
    Ok(())
}

#[cfg(unix)]
#[test]
fn lock_shared_conflict_names_the_file() -> Result<()> {
    let root = unique_root("lock-busy");
    let p = write_segment(&root, "seg.zap", &pattern(256, 12))?;

    let writer = OpenOptions::new().read(true).write(true).open(&p)?;
    FileExt::try_lock_exclusive(&writer)?;

    let budget = Arc::new(MmapBudget::unlimited());
    let cfg = MmapConfig::default().with_lock_shared(true);
    let err = match Segment::open(&p, budget, &cfg) {
        Ok(_) => anyhow::bail!("shared lock granted next to an exclusive one"),
        Err(e) => e,
    };
    let msg = format!("{err:#}");
    assert!(msg.contains("try_lock_shared failed"), "got {msg}");
    assert!(msg.contains("seg.zap"), "got {msg}");

    FileExt::unlock(&writer)?;
    Ok(())
}
