//! Centralized mmap configuration for QuiverSeg.
//!
//! Goals:
//! - Single place to collect mmap tunables instead of scattering env lookups.
//! - MmapConfig::from_env() reads the P1_* env vars, builder setters override them.
//! - MmapBudget::from_config() consumes the result (see budget.rs).
//!
//! Env:
//! - P1_MMAP_IGNORE_ERRORS = 0|1|true|false|yes|no|on|off (default false)
//! - P1_MMAP_MAX_BYTES     = u64, 0 = unlimited (default 0)
//! - P1_MMAP_ON_OPEN       = bool, map segments right after open (default false, lazy)
//! - P1_SEG_LOCK_SHARED    = bool, fs2 shared lock on segment files (default false)

use std::fmt;

/// Mmap configuration (process-wide policy + per-open behaviour).
#[derive(Clone, Debug, Default)]
pub struct MmapConfig {
    /// Suppress and log mmap failures, falling back to positioned reads.
    /// Env: P1_MMAP_IGNORE_ERRORS (default false)
    pub ignore_mmap_errors: bool,

    /// Soft cap on the total number of concurrently mapped bytes (0 = unlimited).
    /// Checked on admission only; existing mappings are never evicted.
    /// Env: P1_MMAP_MAX_BYTES (default 0)
    pub max_mmap_bytes: u64,

    /// Pre-warm: call mmap_hint() right after Segment::open.
    /// Env: P1_MMAP_ON_OPEN (default false)
    pub mmap_on_open: bool,

    /// Hold an fs2 shared lock on the segment file while it is open.
    /// Env: P1_SEG_LOCK_SHARED (default false)
    pub lock_shared: bool,
}

#[inline]
fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        let s = v.trim().to_ascii_lowercase();
        s == "1" || s == "true" || s == "yes" || s == "on"
    })
}

impl MmapConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(on) = env_bool("P1_MMAP_IGNORE_ERRORS") {
            cfg.ignore_mmap_errors = on;
        }

        if let Ok(v) = std::env::var("P1_MMAP_MAX_BYTES") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.max_mmap_bytes = n;
            }
        }

        if let Some(on) = env_bool("P1_MMAP_ON_OPEN") {
            cfg.mmap_on_open = on;
        }

        if let Some(on) = env_bool("P1_SEG_LOCK_SHARED") {
            cfg.lock_shared = on;
        }

        cfg
    }

    pub fn with_ignore_mmap_errors(mut self, on: bool) -> Self {
        self.ignore_mmap_errors = on;
        self
    }

    pub fn with_max_mmap_bytes(mut self, max: u64) -> Self {
        self.max_mmap_bytes = max;
        self
    }

    pub fn with_mmap_on_open(mut self, on: bool) -> Self {
        self.mmap_on_open = on;
        self
    }

    pub fn with_lock_shared(mut self, on: bool) -> Self {
        self.lock_shared = on;
        self
    }
}

impl fmt::Display for MmapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MmapConfig {{ \
             ignore_mmap_errors: {}, \
             max_mmap_bytes: {}, \
             mmap_on_open: {}, \
             lock_shared: {} \
             }}",
            self.ignore_mmap_errors,
            if self.max_mmap_bytes == 0 {
                "unlimited".to_string()
            } else {
                self.max_mmap_bytes.to_string()
            },
            self.mmap_on_open,
            self.lock_shared,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lazy_and_unlimited() {
        let cfg = MmapConfig::default();
        assert!(!cfg.ignore_mmap_errors);
        assert_eq!(cfg.max_mmap_bytes, 0);
        assert!(!cfg.mmap_on_open);
        assert!(!cfg.lock_shared);
        assert!(cfg.to_string().contains("max_mmap_bytes: unlimited"));
    }

    #[test]
    fn builder_overrides() {
        let cfg = MmapConfig::default()
            .with_ignore_mmap_errors(true)
            .with_max_mmap_bytes(4096)
            .with_mmap_on_open(true)
            .with_lock_shared(true);
        assert!(cfg.ignore_mmap_errors);
        assert_eq!(cfg.max_mmap_bytes, 4096);
        assert!(cfg.mmap_on_open);
        assert!(cfg.lock_shared);
        assert!(cfg.to_string().contains("max_mmap_bytes: 4096"));
    }
}
