//! budget: process-wide accounting of mapped bytes.
//!
//! One MmapBudget is shared (Arc) by every segment of a process. The counter is
//! mutated only together with a segment's Unmapped <-> Mapped transition:
//! commit() after a successful map, release() after a successful unmap. Hence
//! at any quiescent point: current_bytes() == Σ size of currently mapped segments.
//!
//! The max is an admission gate only (would_exceed() before the mmap syscall).
//! Check and commit are not one transaction, so two racing loads may both pass
//! and overshoot the max slightly; the max is a soft bound.
//!
//! No locks here. Everything is atomics.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::MmapConfig;

/// Snapshot for external telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MmapStats {
    /// Total number of bytes currently mapped with mmap.
    pub mmap_current_bytes: u64,
}

#[derive(Debug, Default)]
pub struct MmapBudget {
    current: AtomicU64,
    // 0 = unlimited
    max_bytes: AtomicU64,
    ignore_errors: AtomicBool,
}

static PROCESS_BUDGET: OnceLock<Arc<MmapBudget>> = OnceLock::new();

impl MmapBudget {
    pub fn new(max_bytes: u64, ignore_errors: bool) -> Self {
        Self {
            current: AtomicU64::new(0),
            max_bytes: AtomicU64::new(max_bytes),
            ignore_errors: AtomicBool::new(ignore_errors),
        }
    }

    /// Unlimited budget, mapping errors are propagated.
    pub fn unlimited() -> Self {
        Self::new(0, false)
    }

    pub fn from_config(cfg: &MmapConfig) -> Self {
        Self::new(cfg.max_mmap_bytes, cfg.ignore_mmap_errors)
    }

    /// Lazily-initialized process budget built from MmapConfig::from_env().
    /// Libraries should prefer passing their own Arc<MmapBudget> explicitly.
    pub fn process() -> Arc<MmapBudget> {
        PROCESS_BUDGET
            .get_or_init(|| Arc::new(MmapBudget::from_config(&MmapConfig::from_env())))
            .clone()
    }

    /// Bytes currently mapped (atomic load, no side effects).
    #[inline]
    pub fn current_bytes(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Configured maximum (0 = unlimited).
    #[inline]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors.load(Ordering::Relaxed)
    }

    /// Change the cap at runtime. Mappings already admitted stay mapped.
    pub fn set_max_bytes(&self, max: u64) {
        self.max_bytes.store(max, Ordering::Relaxed);
    }

    pub fn set_ignore_errors(&self, on: bool) {
        self.ignore_errors.store(on, Ordering::Relaxed);
    }

    /// true iff a max is configured and mapping `n` more bytes would go past it.
    /// Advisory pre-filter, not a reservation.
    #[inline]
    pub fn would_exceed(&self, n: u64) -> bool {
        let max = self.max_bytes();
        max > 0 && self.current_bytes().saturating_add(n) > max
    }

    /// Account a successful map of `n` bytes.
    #[inline]
    pub fn commit(&self, n: u64) {
        self.current.fetch_add(n, Ordering::AcqRel);
    }

    /// Account a successful unmap of `n` bytes.
    #[inline]
    pub fn release(&self, n: u64) {
        let prev = self.current.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(prev >= n, "mmap budget underflow: {} - {}", prev, n);
    }

    pub fn stats(&self) -> MmapStats {
        MmapStats {
            mmap_current_bytes: self.current_bytes(),
        }
    }
}

/// Memory usage details for the segments sharing `budget`.
pub fn stats(budget: &MmapBudget) -> MmapStats {
    budget.stats()
}
