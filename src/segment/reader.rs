//! segment/reader: uniform read(start, end) over a segment.
//!
//! - Delegated segment: forward to the owner unchanged.
//! - Own segment: snapshot the current view under the read lock, drop the lock,
//!   then either slice the view (zero-copy) or issue a positioned read.
//!
//! The lock guards the pointer only; the byte copy of a fallback read never
//! holds it. SegBytes::Mapped keeps its view alive by Arc, so a slice handed
//! out before unload_mmap() stays readable even after the segment dropped
//! its claim on the mapping.

use anyhow::{anyhow, Result};
use std::fmt;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::controller::OwnedMap;
use super::mapper::MapView;
use super::owner::MmapOwner;
use super::{Segment, SegmentSource};
use crate::error::SegError;
use crate::metrics::{record_read_fallback, record_read_mapped};

// -------------------- positioned read --------------------

/// Read-only positioned-read file abstraction (no shared cursor).
pub trait ReadAt: Send + Sync {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;
}

#[cfg(unix)]
impl ReadAt for File {
    #[inline]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.seek_read(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ))
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

// -------------------- bytes handed out to callers --------------------

/// Bytes of a [start, end) range. Derefs to &[u8].
#[derive(Clone)]
pub enum SegBytes {
    /// Zero-copy slice of a mapped view.
    Mapped {
        view: Arc<dyn MapView>,
        start: usize,
        end: usize,
    },
    /// Slice of a shared in-memory buffer (MemOwner).
    Shared {
        buf: Arc<[u8]>,
        start: usize,
        end: usize,
    },
    /// Freshly read by positioned I/O.
    Owned(Vec<u8>),
}

impl SegBytes {
    pub fn empty() -> Self {
        SegBytes::Owned(Vec::new())
    }

    /// true if served straight from an mmap view.
    pub fn is_mapped(&self) -> bool {
        matches!(self, SegBytes::Mapped { .. })
    }

    pub fn into_vec(self) -> Vec<u8> {
        match self {
            SegBytes::Owned(v) => v,
            other => other.deref().to_vec(),
        }
    }
}

impl Deref for SegBytes {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            SegBytes::Mapped { view, start, end } => &view.as_bytes()[*start..*end],
            SegBytes::Shared { buf, start, end } => &buf[*start..*end],
            SegBytes::Owned(v) => v.as_slice(),
        }
    }
}

impl AsRef<[u8]> for SegBytes {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for SegBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            SegBytes::Mapped { .. } => "mapped",
            SegBytes::Shared { .. } => "shared",
            SegBytes::Owned(_) => "owned",
        };
        f.debug_struct("SegBytes")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

impl PartialEq<[u8]> for SegBytes {
    fn eq(&self, other: &[u8]) -> bool {
        self.deref() == other
    }
}

// -------------------- helpers --------------------

#[inline]
pub(crate) fn check_range(start: u64, end: u64, size: u64) -> Result<()> {
    if start > end || end > size {
        return Err(SegError::OutOfRange { start, end, size }.into());
    }
    Ok(())
}

/// Positioned read of exactly end-start bytes.
pub fn read_range_at<R: ReadAt + ?Sized>(r: &R, label: &str, start: u64, end: u64) -> Result<Vec<u8>> {
    let len = usize::try_from(end - start)
        .map_err(|_| anyhow!("range [{}, {}) too large for this platform", start, end))?;
    let mut buf = vec![0u8; len];
    if len > 0 {
        r.read_exact_at(&mut buf, start).map_err(|e| SegError::Read {
            label: label.to_string(),
            start,
            end,
            source: e,
        })?;
    }
    Ok(buf)
}

// -------------------- read paths --------------------

impl OwnedMap {
    pub(crate) fn read_mm(&self, start: u64, end: u64) -> Result<SegBytes> {
        check_range(start, end, self.size)?;

        // First touch maps lazily (unless someone already hinted/loaded).
        if !self.touched.swap(true, Ordering::AcqRel) {
            self.hint();
        }

        let view = self.current_view()?;

        if let Some(view) = view {
            record_read_mapped();
            return Ok(SegBytes::Mapped {
                view,
                start: start as usize,
                end: end as usize,
            });
        }

        let data = read_range_at(&self.file, &self.label, start, end)?;
        record_read_fallback(data.len());
        Ok(SegBytes::Owned(data))
    }
}

impl Segment {
    /// Bytes of [start, end). `0 <= start <= end <= size()`.
    ///
    /// Served from the mapped view when one is active, otherwise by positioned
    /// read of the backing file. Delegated segments forward the call as is.
    pub fn read_mm(&self, start: u64, end: u64) -> Result<SegBytes> {
        match &self.source {
            SegmentSource::Delegated(owner) => owner.read_mm(start, end),
            SegmentSource::Owned(m) => m.read_mm(start, end),
        }
    }

    /// Convenience: read the whole segment.
    pub fn read_all(&self) -> Result<SegBytes> {
        self.read_mm(0, self.size())
    }
}
