#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use QuiverSeg::{MapView, Mapper, OsMapper};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("qsegtest-{prefix}-{pid}-{t}-{id}"))
}

/// Deterministic, position-dependent content so misplaced slices are caught.
pub fn pattern(len: usize, salt: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i as u64).wrapping_mul(31).wrapping_add(salt as u64 * 7) % 251) as u8)
        .collect()
}

pub fn write_segment(root: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(root)?;
    let p = root.join(name);
    let mut f = File::create(&p)?;
    f.write_all(data)?;
    f.sync_all()?;
    Ok(p)
}

/// Mapper wrapper with failure injection, a count of real map calls, of
/// unmap attempts and of views not yet destroyed.
#[derive(Default)]
pub struct FlakyMapper {
    pub fail_map: AtomicBool,
    pub fail_unmap: Arc<AtomicBool>,
    pub map_calls: AtomicUsize,
    pub unmap_calls: Arc<AtomicUsize>,
    pub live_views: Arc<AtomicUsize>,
}

impl FlakyMapper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_map(&self, on: bool) {
        self.fail_map.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_unmap(&self, on: bool) {
        self.fail_unmap.store(on, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.map_calls.load(Ordering::SeqCst)
    }

    pub fn unmaps(&self) -> usize {
        self.unmap_calls.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live_views.load(Ordering::SeqCst)
    }
}

struct FlakyView {
    inner: Arc<dyn MapView>,
    fail_unmap: Arc<AtomicBool>,
    unmap_calls: Arc<AtomicUsize>,
    live_views: Arc<AtomicUsize>,
}

impl Drop for FlakyView {
    fn drop(&mut self) {
        self.live_views.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MapView for FlakyView {
    fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    fn unmap(&self) -> io::Result<()> {
        self.unmap_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_unmap.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected munmap failure"));
        }
        self.inner.unmap()
    }
}

impl Mapper for FlakyMapper {
    fn map_ro(&self, file: &File, len: u64) -> io::Result<Arc<dyn MapView>> {
        self.map_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_map.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "injected mmap failure"));
        }
        // widen the race window for concurrent loaders
        std::thread::sleep(std::time::Duration::from_millis(5));
        let inner = OsMapper.map_ro(file, len)?;
        self.live_views.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FlakyView {
            inner,
            fail_unmap: self.fail_unmap.clone(),
            unmap_calls: self.unmap_calls.clone(),
            live_views: self.live_views.clone(),
        }))
    }
}
