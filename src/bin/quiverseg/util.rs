use std::sync::Arc;

use QuiverSeg::{MmapBudget, MmapConfig};

use super::cli::GlobalOpts;

pub fn build_config(g: &GlobalOpts) -> MmapConfig {
    let mut cfg = MmapConfig::from_env();
    if g.ignore_mmap_errors {
        cfg = cfg.with_ignore_mmap_errors(true);
    }
    if let Some(max) = g.max_mmap_bytes {
        cfg = cfg.with_max_mmap_bytes(max);
    }
    cfg
}

/// Process budget with the command-line overrides applied.
pub fn build_budget(cfg: &MmapConfig) -> Arc<MmapBudget> {
    let budget = MmapBudget::process();
    budget.set_max_bytes(cfg.max_mmap_bytes);
    budget.set_ignore_errors(cfg.ignore_mmap_errors);
    budget
}

pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{:08x}  ", i * 16));
        for (j, b) in chunk.iter().enumerate() {
            if j > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{:02x}", b));
        }
    }
    out
}

pub fn display_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => format!("(binary {} B)", bytes.len()),
    }
}
