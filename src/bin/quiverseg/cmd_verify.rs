use anyhow::{anyhow, Result};
use log::info;
use std::path::PathBuf;

use QuiverSeg::Segment;

use super::cli::GlobalOpts;
use super::util::{build_budget, build_config};

/// Reads the segment twice (mapped view and positioned I/O) and compares CRC32C
/// of every chunk. The mapped pass falls back to I/O itself if mmap is refused.
pub fn exec(g: &GlobalOpts, path: PathBuf, chunk: u64, json: bool) -> Result<()> {
    if chunk == 0 {
        return Err(anyhow!("--chunk must be > 0"));
    }
    let cfg = build_config(g);
    let budget = build_budget(&cfg);

    let mapped = Segment::open(&path, budget.clone(), &cfg)?;
    mapped.load_mmap()?;
    let direct = Segment::open_file_io(&path, budget.clone(), &cfg)?;

    let size = mapped.size();
    let mut chunks = 0u64;
    let mut mismatches: Vec<u64> = Vec::new();
    let mut crc_total = 0u32;

    let mut start = 0u64;
    while start < size {
        let end = (start + chunk).min(size);
        let a = mapped.read_mm(start, end)?;
        let b = direct.read_mm(start, end)?;
        let ca = crc32c::crc32c(&a);
        let cb = crc32c::crc32c(&b);
        if ca != cb {
            mismatches.push(start);
        }
        crc_total = crc32c::crc32c_append(crc_total, &a);
        chunks += 1;
        start = end;
    }
    info!(
        "verify {}: {} chunks, mapped={}, mismatches={}",
        path.display(),
        chunks,
        mapped.is_mapped(),
        mismatches.len()
    );

    if json {
        let out = serde_json::json!({
            "path": path.display().to_string(),
            "size": size,
            "chunks": chunks,
            "mapped": mapped.is_mapped(),
            "crc32c": format!("{:08x}", crc_total),
            "mismatch_offsets": mismatches,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "VERIFY {}: size={} chunks={} mapped={} crc32c={:08x} mismatches={}",
            path.display(),
            size,
            chunks,
            mapped.is_mapped(),
            crc_total,
            mismatches.len()
        );
    }

    direct.close()?;
    mapped.close()?;

    if !mismatches.is_empty() {
        return Err(anyhow!(
            "{} chunk(s) differ between mmap and file I/O (first at offset {})",
            mismatches.len(),
            mismatches[0]
        ));
    }
    Ok(())
}
