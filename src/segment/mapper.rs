//! segment/mapper: OS read-only mapping primitive.
//!
//! Mapper::map_ro(file, len) -> view; MapView::unmap() -> io::Result.
//! The controller only talks to these traits, so tests can inject a mapper
//! that fails map or unmap on demand.

use memmap2::{Mmap, MmapOptions};
use std::fmt;
use std::fs::File;
use std::io;
use std::sync::Arc;

/// The bytes of a whole segment file mapped into the address space.
pub trait MapView: Send + Sync {
    fn as_bytes(&self) -> &[u8];

    /// Request release of the mapping. On Err the view stays valid and the
    /// segment keeps it.
    fn unmap(&self) -> io::Result<()>;
}

pub trait Mapper: Send + Sync {
    /// Map `len` bytes of `file` from offset 0, read-only.
    fn map_ro(&self, file: &File, len: u64) -> io::Result<Arc<dyn MapView>>;
}

/// memmap2-backed mapper.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsMapper;

pub struct OsView {
    mmap: Mmap,
}

impl fmt::Debug for OsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsView").field("len", &self.mmap.len()).finish()
    }
}

impl MapView for OsView {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    // munmap itself happens when the last Arc (segment slot or SegBytes held by
    // a reader) is dropped; memmap2 has no fallible unmap.
    fn unmap(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Mapper for OsMapper {
    fn map_ro(&self, file: &File, len: u64) -> io::Result<Arc<dyn MapView>> {
        let len = usize::try_from(len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("segment of {} bytes does not fit the address space", len),
            )
        })?;
        // SAFETY: segment files are immutable once written. The optional fs2 shared
        // lock (P1_SEG_LOCK_SHARED) keeps cooperating writers from truncating them.
        let mmap = unsafe { MmapOptions::new().offset(0).len(len).map(file)? };
        Ok(Arc::new(OsView { mmap }))
    }
}

/// Shared default mapper instance.
pub fn os_mapper() -> Arc<dyn Mapper> {
    Arc::new(OsMapper)
}
