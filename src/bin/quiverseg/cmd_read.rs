use anyhow::Result;
use std::path::PathBuf;

use QuiverSeg::Segment;

use super::cli::GlobalOpts;
use super::util::{build_budget, build_config, display_text, hex_dump};

pub fn exec(
    g: &GlobalOpts,
    path: PathBuf,
    start: u64,
    end: Option<u64>,
    hex: bool,
    no_mmap: bool,
) -> Result<()> {
    let cfg = build_config(g);
    let budget = build_budget(&cfg);
    let seg = if no_mmap {
        Segment::open_file_io(&path, budget, &cfg)?
    } else {
        Segment::open(&path, budget, &cfg)?
    };

    let end = end.unwrap_or_else(|| seg.size());
    let bytes = seg.read_mm(start, end)?;

    println!(
        "READ [{}, {}) {} B via {}",
        start,
        end,
        bytes.len(),
        if bytes.is_mapped() { "mmap" } else { "file I/O" }
    );
    if hex {
        println!("{}", hex_dump(&bytes));
    } else {
        println!("{}", display_text(&bytes));
    }

    drop(bytes);
    seg.close()
}
