//! Error kinds of the segment mmap layer.
//!
//! Public functions return anyhow::Result like the rest of the crate; these
//! values travel inside anyhow::Error and can be classified with
//! `err.downcast_ref::<SegError>()`.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegError {
    /// mmap syscall failed (surfaced only when ignore_mmap_errors is off).
    #[error("mmap {label} ({size} bytes): {source}")]
    Mapping {
        label: String,
        size: u64,
        #[source]
        source: io::Error,
    },

    /// unmap failed; the segment stays Mapped and the budget is not released.
    #[error("munmap {label} ({size} bytes): {source}")]
    Unmapping {
        label: String,
        size: u64,
        #[source]
        source: io::Error,
    },

    /// Positioned read on the fallback path failed or came up short.
    #[error("read [{start}, {end}) from {label}: {source}")]
    Read {
        label: String,
        start: u64,
        end: u64,
        #[source]
        source: io::Error,
    },

    #[error("range [{start}, {end}) out of bounds for segment of {size} bytes")]
    OutOfRange { start: u64, end: u64, size: u64 },
}

impl SegError {
    pub fn is_mapping(&self) -> bool {
        matches!(self, SegError::Mapping { .. })
    }

    pub fn is_unmapping(&self) -> bool {
        matches!(self, SegError::Unmapping { .. })
    }

    pub fn is_read(&self) -> bool {
        matches!(self, SegError::Read { .. })
    }
}

/// Classify an anyhow error produced by this crate (None for foreign errors).
pub fn seg_error(err: &anyhow::Error) -> Option<&SegError> {
    err.downcast_ref::<SegError>()
}
