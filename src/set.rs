//! set: a directory of segment files sharing one budget.
//!
//! Minimal "layer above": opens every regular file of a directory (sorted by
//! name), pre-warms them in order and closes them together. Segments earlier in
//! name order get admitted first when max_mmap_bytes is set.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::budget::{MmapBudget, MmapStats};
use crate::config::MmapConfig;
use crate::segment::{Segment, SegmentInfo};

pub struct SegmentSet {
    root: PathBuf,
    budget: Arc<MmapBudget>,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmReport {
    pub segments: usize,
    pub mapped: usize,
    pub mapped_bytes: u64,
    pub fallback_bytes: u64,
    pub stats: MmapStats,
}

impl SegmentSet {
    /// Open all regular files under `root` (non-recursive).
    pub fn open_dir(root: &Path, budget: Arc<MmapBudget>, cfg: &MmapConfig) -> Result<Self> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in
            fs::read_dir(root).with_context(|| format!("read_dir {}", root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut segments = Vec::with_capacity(paths.len());
        for p in &paths {
            segments.push(Segment::open(p, budget.clone(), cfg)?);
        }
        info!(
            "segment set {}: opened {} segments",
            root.display(),
            segments.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            budget,
            segments,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn budget(&self) -> &Arc<MmapBudget> {
        &self.budget
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// mmap_hint() every segment in name order and report what got mapped.
    pub fn hint_all(&self) -> WarmReport {
        for s in &self.segments {
            s.mmap_hint();
        }
        self.report()
    }

    pub fn report(&self) -> WarmReport {
        let mut mapped = 0usize;
        let mut mapped_bytes = 0u64;
        let mut fallback_bytes = 0u64;
        for s in &self.segments {
            if s.is_mapped() {
                mapped += 1;
                mapped_bytes += s.size();
            } else {
                fallback_bytes += s.size();
            }
        }
        WarmReport {
            segments: self.segments.len(),
            mapped,
            mapped_bytes,
            fallback_bytes,
            stats: self.budget.stats(),
        }
    }

    pub fn infos(&self) -> Vec<SegmentInfo> {
        self.segments.iter().map(|s| s.info()).collect()
    }

    /// Close every segment; the first unmap error is returned after trying all.
    pub fn close_all(self) -> Result<()> {
        let mut first_err = None;
        for s in self.segments {
            let label = s.info().path.unwrap_or_default();
            if let Err(e) = s.close() {
                warn!("close segment {}: {:#}", label, e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
