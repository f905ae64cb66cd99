//! segment: one immutable on-disk storage unit, readable through a mapped
//! view or positioned file I/O.
//!
//! Разнесение:
//! - mapper.rs     - OS read-only mmap primitive (Mapper / MapView, memmap2 impl).
//! - controller.rs - Unmapped/Mapped state machine, budget admission.
//! - reader.rs     - read_mm(start, end), SegBytes, positioned-read fallback.
//! - owner.rs      - MmapOwner delegation capability (+ in-memory owner).
//!
//! Lifecycle: open -> (lazy map on first read | mmap_hint) -> ... -> close/drop.
//! A segment may cycle Unmapped -> Mapped -> Unmapped any number of times.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::budget::MmapBudget;
use crate::config::MmapConfig;

pub(crate) mod controller;
pub mod mapper;
pub mod owner;
pub mod reader;

use controller::OwnedMap;
use mapper::{os_mapper, Mapper};
use owner::MmapOwner;

pub use mapper::{MapView, OsMapper};
pub use owner::{MemOwner, OffsetOwner};
pub use reader::{ReadAt, SegBytes};

/// Who serves the bytes of a segment.
pub(crate) enum SegmentSource {
    /// Own file handle + own mapping lifecycle.
    Owned(OwnedMap),
    /// All reads forwarded to an external owner; no mapping of our own.
    Delegated(Arc<dyn MmapOwner>),
}

pub struct Segment {
    path: Option<PathBuf>,
    size: u64,
    pub(crate) source: SegmentSource,
}

/// Per-segment snapshot for status output.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
    pub path: Option<String>,
    pub size: u64,
    pub delegated: bool,
    pub mapped: bool,
}

impl Segment {
    /// Open a segment file read-only and map it lazily.
    pub fn open(path: &Path, budget: Arc<MmapBudget>, cfg: &MmapConfig) -> Result<Self> {
        Self::open_with_mapper(path, budget, cfg, os_mapper())
    }

    /// As open(), with an explicit mapping primitive.
    pub fn open_with_mapper(
        path: &Path,
        budget: Arc<MmapBudget>,
        cfg: &MmapConfig,
        mapper: Arc<dyn Mapper>,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open segment {}", path.display()))?;
        let size = file
            .metadata()
            .with_context(|| format!("stat segment {}", path.display()))?
            .len();

        let map = OwnedMap::new(
            file,
            size,
            path.display().to_string(),
            budget,
            mapper,
            cfg.lock_shared,
        )?;
        let seg = Self {
            path: Some(path.to_path_buf()),
            size,
            source: SegmentSource::Owned(map),
        };
        if cfg.mmap_on_open {
            seg.mmap_hint();
        }
        Ok(seg)
    }

    /// Wrap an already open file; `size` bytes from offset 0 are mapped.
    pub fn from_file(
        file: File,
        size: u64,
        budget: Arc<MmapBudget>,
        mapper: Arc<dyn Mapper>,
    ) -> Result<Self> {
        let flen = file.metadata().context("stat segment file")?.len();
        if size > flen {
            return Err(anyhow!("segment size {} exceeds file length {}", size, flen));
        }
        let map = OwnedMap::new(file, size, "<file>".to_string(), budget, mapper, false)?;
        Ok(Self {
            path: None,
            size,
            source: SegmentSource::Owned(map),
        })
    }

    /// Segment whose reads are served by `owner`.
    pub fn delegated(owner: Arc<dyn MmapOwner>, size: u64) -> Self {
        Self {
            path: None,
            size,
            source: SegmentSource::Delegated(owner),
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.source, SegmentSource::Delegated(_))
    }

    /// true while this segment holds an active mapped view.
    pub fn is_mapped(&self) -> bool {
        match &self.source {
            SegmentSource::Owned(m) => m.is_mapped(),
            SegmentSource::Delegated(_) => false,
        }
    }

    /// Map the backing file (Unmapped -> Mapped). Idempotent.
    ///
    /// Returns Ok without mapping when the budget would be exceeded, or when
    /// mapping fails and the budget ignores mmap errors; reads then use file I/O.
    pub fn load_mmap(&self) -> Result<()> {
        match &self.source {
            SegmentSource::Owned(m) => m.load(),
            SegmentSource::Delegated(_) => Ok(()),
        }
    }

    /// Release the mapping (Mapped -> Unmapped). Idempotent.
    /// On failure the segment stays Mapped and keeps serving from its view.
    pub fn unload_mmap(&self) -> Result<()> {
        match &self.source {
            SegmentSource::Owned(m) => m.unload(),
            SegmentSource::Delegated(_) => Ok(()),
        }
    }

    /// Requests that the segment be mapped into memory for faster access.
    ///
    /// This usually happens automatically on first read, but helps on 32-bit
    /// systems or to get admitted before max_mmap_bytes fills up.
    pub fn mmap_hint(&self) {
        if let SegmentSource::Owned(m) = &self.source {
            m.hint();
        }
    }

    /// Enable/disable mapping on first read. With it off the segment is mapped
    /// only through load_mmap()/mmap_hint(); until then reads use file I/O.
    pub fn set_lazy_mmap(&self, on: bool) {
        if let SegmentSource::Owned(m) = &self.source {
            m.touched.store(!on, Ordering::Release);
        }
    }

    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            path: self.path.as_ref().map(|p| p.display().to_string()),
            size: self.size,
            delegated: self.is_delegated(),
            mapped: self.is_mapped(),
        }
    }

    /// Open a segment that never maps: no pre-warm, no first-touch mapping.
    /// Every read goes through positioned file I/O until load_mmap() is called.
    pub fn open_file_io(path: &Path, budget: Arc<MmapBudget>, cfg: &MmapConfig) -> Result<Self> {
        let cfg = cfg.clone().with_mmap_on_open(false);
        let seg = Self::open(path, budget, &cfg)?;
        seg.set_lazy_mmap(false);
        Ok(seg)
    }

    /// Unmap and close. Unlike drop, an unmap failure is returned.
    ///
    /// On failure the mapping is left in place for the rest of the process and
    /// its bytes stay in the budget; drop does not try again.
    pub fn close(self) -> Result<()> {
        // file handle closes on drop
        let res = self.unload_mmap();
        if res.is_err() {
            if let SegmentSource::Owned(m) = &self.source {
                m.leak_view();
            }
        }
        res
    }
}
