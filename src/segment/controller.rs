//! segment/controller: Unmapped <-> Mapped state machine of one own segment.
//!
//! load_mmap():
//!   budget pre-check -> lock-free "already mapped?" -> write lock ->
//!   re-check under lock -> map_ro -> commit(size) + store view.
//! unload_mmap():
//!   write lock -> no view? Ok -> view.unmap() -> release(size) + clear view.
//!   A failed unmap leaves the view in place and the budget untouched.
//!
//! The budget counter is touched only under this segment's own lock and only via
//! atomics, so no segment ever waits on another segment's lock.

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use log::{debug, warn};
use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use super::mapper::{MapView, Mapper};
use crate::budget::MmapBudget;
use crate::error::SegError;
use crate::metrics::{
    record_budget_rejection, record_mmap_map, record_mmap_map_failure, record_mmap_unmap,
    record_mmap_unmap_failure,
};

pub(crate) struct OwnedMap {
    pub(crate) file: File,
    pub(crate) size: u64,
    // path or "<file>" for diagnostics
    pub(crate) label: String,
    pub(crate) budget: Arc<MmapBudget>,
    pub(crate) mapper: Arc<dyn Mapper>,

    pub(crate) view: RwLock<Option<Arc<dyn MapView>>>,
    // mirror of view.is_some(); written under the write lock
    pub(crate) mapped: AtomicBool,
    // set by the first read/hint; lazy mapping happens once
    pub(crate) touched: AtomicBool,
    pub(crate) locked_shared: bool,
}

impl OwnedMap {
    pub(crate) fn new(
        file: File,
        size: u64,
        label: String,
        budget: Arc<MmapBudget>,
        mapper: Arc<dyn Mapper>,
        lock_shared: bool,
    ) -> Result<Self> {
        if lock_shared {
            FileExt::try_lock_shared(&file)
                .with_context(|| format!("try_lock_shared failed: {}", label))?;
        }
        Ok(Self {
            file,
            size,
            label,
            budget,
            mapper,
            view: RwLock::new(None),
            mapped: AtomicBool::new(false),
            touched: AtomicBool::new(false),
            locked_shared: lock_shared,
        })
    }

    #[inline]
    pub(crate) fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    pub(crate) fn current_view(&self) -> Result<Option<Arc<dyn MapView>>> {
        let guard = self
            .view
            .read()
            .map_err(|_| anyhow!("segment view lock poisoned ({})", self.label))?;
        Ok(guard.clone())
    }

    pub(crate) fn load(&self) -> Result<()> {
        self.touched.store(true, Ordering::Release);

        if self.budget.would_exceed(self.size) {
            if !self.is_mapped() {
                record_budget_rejection();
                debug!(
                    "mmap: budget rejects {} ({} bytes, current {}, max {}), using file I/O",
                    self.label,
                    self.size,
                    self.budget.current_bytes(),
                    self.budget.max_bytes()
                );
            }
            return Ok(());
        }

        if self.is_mapped() {
            return Ok(());
        }

        // nothing to map; reads of [0, 0) never need a view
        if self.size == 0 {
            return Ok(());
        }

        let mut slot = self
            .view
            .write()
            .map_err(|_| anyhow!("segment view lock poisoned ({})", self.label))?;

        if slot.is_some() {
            return Ok(());
        }

        match self.mapper.map_ro(&self.file, self.size) {
            Ok(view) => {
                self.budget.commit(self.size);
                *slot = Some(view);
                self.mapped.store(true, Ordering::Release);
                record_mmap_map();
                debug!(
                    "mmap: mapped {} ({} bytes, total {})",
                    self.label,
                    self.size,
                    self.budget.current_bytes()
                );
                Ok(())
            }
            Err(e) => {
                record_mmap_map_failure();
                if self.budget.ignore_errors() {
                    warn!("Ignoring mmap error for {}: {}", self.label, e);
                    return Ok(());
                }
                Err(SegError::Mapping {
                    label: self.label.clone(),
                    size: self.size,
                    source: e,
                }
                .into())
            }
        }
    }

    pub(crate) fn unload(&self) -> Result<()> {
        let mut slot = self
            .view
            .write()
            .map_err(|_| anyhow!("segment view lock poisoned ({})", self.label))?;

        let view = match slot.as_ref() {
            Some(v) => v,
            None => return Ok(()),
        };

        if let Err(e) = view.unmap() {
            record_mmap_unmap_failure();
            return Err(SegError::Unmapping {
                label: self.label.clone(),
                size: self.size,
                source: e,
            }
            .into());
        }

        self.budget.release(self.size);
        *slot = None;
        self.mapped.store(false, Ordering::Release);
        record_mmap_unmap();
        debug!(
            "mmap: unmapped {} ({} bytes, total {})",
            self.label,
            self.size,
            self.budget.current_bytes()
        );
        Ok(())
    }

    pub(crate) fn hint(&self) {
        if let Err(e) = self.load() {
            debug!("mmap hint for {} ignored: {:#}", self.label, e);
        }
    }

    /// Give up on a view whose unmap failed: it stays mapped for the rest of
    /// the process and its bytes stay in the budget. The slot is emptied so
    /// nothing retries the unmap.
    pub(crate) fn leak_view(&self) {
        let taken = match self.view.write() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(view) = taken {
            warn!(
                "mmap: leaking mapping of {} ({} bytes stay accounted)",
                self.label, self.size
            );
            std::mem::forget(view);
            self.mapped.store(false, Ordering::Release);
        }
    }
}

impl Drop for OwnedMap {
    fn drop(&mut self) {
        if let Err(e) = self.unload() {
            warn!("segment {} dropped while still mapped: {:#}", self.label, e);
            self.leak_view();
        }
        if self.locked_shared {
            // the lock goes away with the fd anyway
            let _ = FileExt::unlock(&self.file);
        }
    }
}
