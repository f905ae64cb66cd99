use anyhow::Result;
use std::path::PathBuf;

use QuiverSeg::{metrics, Segment};

use super::cli::GlobalOpts;
use super::util::{build_budget, build_config};

pub fn exec(g: &GlobalOpts, path: PathBuf, json: bool) -> Result<()> {
    let cfg = build_config(g);
    let budget = build_budget(&cfg);

    let seg = Segment::open(&path, budget.clone(), &cfg)?;
    seg.mmap_hint();

    let info = seg.info();
    let stats = budget.stats();

    if json {
        let out = serde_json::json!({
            "segment": info,
            "stats": stats,
            "max_mmap_bytes": budget.max_bytes(),
            "ignore_mmap_errors": budget.ignore_errors(),
            "metrics": metrics::snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("segment:            {}", path.display());
        println!("size:               {} B", info.size);
        println!("mapped:             {}", info.mapped);
        println!("mmap_current_bytes: {}", stats.mmap_current_bytes);
        println!("config:             {}", cfg);
    }

    seg.close()
}
