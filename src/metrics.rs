//! Lightweight global metrics for QuiverSeg.
//!
//! Потокобезопасные атомарные счётчики:
//! - mmap map/unmap transitions and their failures
//! - budget admission rejections
//! - reads served from a mapped view vs. fallback positioned I/O
//!
//! Telemetry only. The mapped-bytes accounting lives in budget.rs and never
//! depends on these counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- mmap transitions -----
static MMAP_MAPS_TOTAL: AtomicU64 = AtomicU64::new(0);
static MMAP_MAP_FAILURES: AtomicU64 = AtomicU64::new(0);
static MMAP_UNMAPS_TOTAL: AtomicU64 = AtomicU64::new(0);
static MMAP_UNMAP_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- budget -----
static MMAP_BUDGET_REJECTIONS: AtomicU64 = AtomicU64::new(0);

// ----- reads -----
static READS_MAPPED: AtomicU64 = AtomicU64::new(0);
static READS_FALLBACK: AtomicU64 = AtomicU64::new(0);
static FALLBACK_BYTES_READ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub mmap_maps_total: u64,
    pub mmap_map_failures: u64,
    pub mmap_unmaps_total: u64,
    pub mmap_unmap_failures: u64,

    pub mmap_budget_rejections: u64,

    pub reads_mapped: u64,
    pub reads_fallback: u64,
    pub fallback_bytes_read: u64,
}

impl MetricsSnapshot {
    pub fn mapped_read_ratio(&self) -> f64 {
        let total = self.reads_mapped + self.reads_fallback;
        if total == 0 {
            0.0
        } else {
            self.reads_mapped as f64 / total as f64
        }
    }
}

// ----- Recorders (mmap) -----
pub fn record_mmap_map() {
    MMAP_MAPS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_mmap_map_failure() {
    MMAP_MAP_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_mmap_unmap() {
    MMAP_UNMAPS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_mmap_unmap_failure() {
    MMAP_UNMAP_FAILURES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (budget) -----
pub fn record_budget_rejection() {
    MMAP_BUDGET_REJECTIONS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (reads) -----
pub fn record_read_mapped() {
    READS_MAPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_read_fallback(bytes: usize) {
    READS_FALLBACK.fetch_add(1, Ordering::Relaxed);
    FALLBACK_BYTES_READ.fetch_add(bytes as u64, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        mmap_maps_total: MMAP_MAPS_TOTAL.load(Ordering::Relaxed),
        mmap_map_failures: MMAP_MAP_FAILURES.load(Ordering::Relaxed),
        mmap_unmaps_total: MMAP_UNMAPS_TOTAL.load(Ordering::Relaxed),
        mmap_unmap_failures: MMAP_UNMAP_FAILURES.load(Ordering::Relaxed),

        mmap_budget_rejections: MMAP_BUDGET_REJECTIONS.load(Ordering::Relaxed),

        reads_mapped: READS_MAPPED.load(Ordering::Relaxed),
        reads_fallback: READS_FALLBACK.load(Ordering::Relaxed),
        fallback_bytes_read: FALLBACK_BYTES_READ.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    MMAP_MAPS_TOTAL.store(0, Ordering::Relaxed);
    MMAP_MAP_FAILURES.store(0, Ordering::Relaxed);
    MMAP_UNMAPS_TOTAL.store(0, Ordering::Relaxed);
    MMAP_UNMAP_FAILURES.store(0, Ordering::Relaxed);

    MMAP_BUDGET_REJECTIONS.store(0, Ordering::Relaxed);

    READS_MAPPED.store(0, Ordering::Relaxed);
    READS_FALLBACK.store(0, Ordering::Relaxed);
    FALLBACK_BYTES_READ.store(0, Ordering::Relaxed);
}
