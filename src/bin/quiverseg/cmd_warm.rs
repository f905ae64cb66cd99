use anyhow::Result;
use std::path::PathBuf;

use QuiverSeg::SegmentSet;

use super::cli::GlobalOpts;
use super::util::{build_budget, build_config};

pub fn exec(g: &GlobalOpts, dir: PathBuf, json: bool) -> Result<()> {
    let cfg = build_config(g);
    let set = SegmentSet::open_dir(&dir, build_budget(&cfg), &cfg)?;
    let report = set.hint_all();

    if json {
        let out = serde_json::json!({
            "report": report,
            "segments": set.infos(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for i in set.infos() {
            println!(
                "{:<8} {:>12} B  {}",
                if i.mapped { "mmap" } else { "file-io" },
                i.size,
                i.path.unwrap_or_default()
            );
        }
        println!(
            "WARM {}: segments={} mapped={} mapped_bytes={} fallback_bytes={} mmap_current_bytes={}",
            dir.display(),
            report.segments,
            report.mapped,
            report.mapped_bytes,
            report.fallback_bytes,
            report.stats.mmap_current_bytes
        );
    }

    set.close_all()
}
