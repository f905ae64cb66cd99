//! segment/owner: read delegation.
//!
//! A segment either manages its own file + mapping, or forwards every
//! read_mm(start, end) to an owner supplied from outside (composed segments:
//! snapshots, overlays, wrappers). MmapOwner is that single-method capability.

use anyhow::Result;
use std::sync::Arc;

use super::reader::{check_range, SegBytes};
use super::Segment;
use crate::error::SegError;

pub trait MmapOwner: Send + Sync {
    fn read_mm(&self, start: u64, end: u64) -> Result<SegBytes>;
}

impl MmapOwner for Segment {
    fn read_mm(&self, start: u64, end: u64) -> Result<SegBytes> {
        Segment::read_mm(self, start, end)
    }
}

impl<T: MmapOwner + ?Sized> MmapOwner for Arc<T> {
    fn read_mm(&self, start: u64, end: u64) -> Result<SegBytes> {
        (**self).read_mm(start, end)
    }
}

/// In-memory segment body (segments built in RAM before they hit disk).
#[derive(Debug, Clone)]
pub struct MemOwner {
    buf: Arc<[u8]>,
}

impl MemOwner {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            buf: Arc::from(bytes.into()),
        }
    }

    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl MmapOwner for MemOwner {
    fn read_mm(&self, start: u64, end: u64) -> Result<SegBytes> {
        check_range(start, end, self.len())?;
        Ok(SegBytes::Shared {
            buf: self.buf.clone(),
            start: start as usize,
            end: end as usize,
        })
    }
}

/// Owner that shifts every range by a fixed offset into a base owner
/// (a sub-segment embedded in a larger file).
pub struct OffsetOwner {
    base: Arc<dyn MmapOwner>,
    offset: u64,
    len: u64,
}

impl OffsetOwner {
    pub fn new(base: Arc<dyn MmapOwner>, offset: u64, len: u64) -> Self {
        Self { base, offset, len }
    }
}

impl MmapOwner for OffsetOwner {
    fn read_mm(&self, start: u64, end: u64) -> Result<SegBytes> {
        check_range(start, end, self.len)?;
        let (s, e) = match (self.offset.checked_add(start), self.offset.checked_add(end)) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                return Err(SegError::OutOfRange {
                    start,
                    end,
                    size: self.len,
                }
                .into())
            }
        };
        self.base.read_mm(s, e)
    }
}
