use anyhow::{anyhow, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::{info, warn};
use tiny_http::{Header, Response, Server};

use std::path::PathBuf;

use QuiverSeg::{metrics, MmapBudget, MmapConfig, SegmentSet};

#[derive(Parser, Debug)]
#[command(
    name = "quiverseg_metrics",
    version,
    about = "QuiverSeg mmap metrics exporter (Prometheus)"
)]
struct Opt {
    #[arg(long, default_value = "0.0.0.0:9899")]
    addr: String,
    /// Directory of segment files to keep open (and pre-warm) while serving
    #[arg(long)]
    path: Option<PathBuf>,
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opt = Opt::parse();

    let cfg = MmapConfig::from_env();
    let budget = MmapBudget::process();

    let set = match &opt.path {
        Some(dir) => {
            let set = SegmentSet::open_dir(dir, budget.clone(), &cfg)?;
            let r = set.hint_all();
            info!(
                "pre-warmed {}: {}/{} segments mapped ({} B)",
                dir.display(),
                r.mapped,
                r.segments,
                r.mapped_bytes
            );
            Some(set)
        }
        None => None,
    };

    let server = Server::http(&opt.addr)
        .map_err(|e| anyhow!("bind http at {}: {}", opt.addr, e))?;
    info!("quiverseg_metrics listening on {}", opt.addr);

    loop {
        let rq = match server.recv() {
            Ok(rq) => rq,
            Err(e) => {
                warn!("http recv error: {}", e);
                continue;
            }
        };

        let url = rq.url().to_string();
        let method = rq.method().as_str().to_string();

        if method == "GET" && (url == "/" || url == "/health" || url == "/ready") {
            let resp = Response::from_string("OK\n").with_status_code(200);
            let _ = rq.respond(resp);
            continue;
        }

        if method == "GET" && url == "/metrics" {
            let body = build_metrics(&budget, set.as_ref());
            let mut resp = Response::from_string(body);
            if let Ok(ct) = Header::from_bytes(b"Content-Type", b"text/plain; version=0.0.4") {
                resp.add_header(ct);
            }
            let _ = rq.respond(resp);
            continue;
        }

        let resp = Response::from_string("not found\n").with_status_code(404);
        let _ = rq.respond(resp);
    }
}

fn build_metrics(budget: &MmapBudget, set: Option<&SegmentSet>) -> String {
    let m = metrics::snapshot();
    let mut out = String::new();

    let ver = env!("CARGO_PKG_VERSION");
    out.push_str("# HELP quiverseg_build_info Build info.\n");
    out.push_str("# TYPE quiverseg_build_info gauge\n");
    out.push_str(&format!("quiverseg_build_info{{version=\"{}\"}} 1\n", ver));

    // --- budget ---
    out.push_str("# HELP quiverseg_mmap_current_bytes Bytes currently mapped with mmap.\n");
    out.push_str("# TYPE quiverseg_mmap_current_bytes gauge\n");
    out.push_str(&format!("quiverseg_mmap_current_bytes {}\n", budget.stats().mmap_current_bytes));

    out.push_str("# HELP quiverseg_mmap_max_bytes Configured mmap cap (0 = unlimited).\n");
    out.push_str("# TYPE quiverseg_mmap_max_bytes gauge\n");
    out.push_str(&format!("quiverseg_mmap_max_bytes {}\n", budget.max_bytes()));

    out.push_str("# HELP quiverseg_mmap_budget_rejections Mappings refused by the budget (served by file I/O).\n");
    out.push_str("# TYPE quiverseg_mmap_budget_rejections counter\n");
    out.push_str(&format!("quiverseg_mmap_budget_rejections {}\n", m.mmap_budget_rejections));

    // --- transitions ---
    out.push_str("# HELP quiverseg_mmap_maps_total Successful mmap calls.\n");
    out.push_str("# TYPE quiverseg_mmap_maps_total counter\n");
    out.push_str(&format!("quiverseg_mmap_maps_total {}\n", m.mmap_maps_total));

    out.push_str("# HELP quiverseg_mmap_map_failures Failed mmap calls.\n");
    out.push_str("# TYPE quiverseg_mmap_map_failures counter\n");
    out.push_str(&format!("quiverseg_mmap_map_failures {}\n", m.mmap_map_failures));

    out.push_str("# HELP quiverseg_mmap_unmaps_total Successful unmaps.\n");
    out.push_str("# TYPE quiverseg_mmap_unmaps_total counter\n");
    out.push_str(&format!("quiverseg_mmap_unmaps_total {}\n", m.mmap_unmaps_total));

    out.push_str("# HELP quiverseg_mmap_unmap_failures Failed unmaps (segment stays mapped).\n");
    out.push_str("# TYPE quiverseg_mmap_unmap_failures counter\n");
    out.push_str(&format!("quiverseg_mmap_unmap_failures {}\n", m.mmap_unmap_failures));

    // --- reads ---
    out.push_str("# HELP quiverseg_reads_mapped Reads served from a mapped view.\n");
    out.push_str("# TYPE quiverseg_reads_mapped counter\n");
    out.push_str(&format!("quiverseg_reads_mapped {}\n", m.reads_mapped));

    out.push_str("# HELP quiverseg_reads_fallback Reads served by positioned file I/O.\n");
    out.push_str("# TYPE quiverseg_reads_fallback counter\n");
    out.push_str(&format!("quiverseg_reads_fallback {}\n", m.reads_fallback));

    out.push_str("# HELP quiverseg_fallback_bytes_read Bytes read by positioned file I/O.\n");
    out.push_str("# TYPE quiverseg_fallback_bytes_read counter\n");
    out.push_str(&format!("quiverseg_fallback_bytes_read {}\n", m.fallback_bytes_read));

    out.push_str("# HELP quiverseg_mapped_read_ratio Share of reads served from mmap (percent).\n");
    out.push_str("# TYPE quiverseg_mapped_read_ratio gauge\n");
    out.push_str(&format!("quiverseg_mapped_read_ratio {:.2}\n", m.mapped_read_ratio() * 100.0));

    // --- segment set (optional) ---
    if let Some(set) = set {
        let r = set.report();
        out.push_str("# HELP quiverseg_segments Open segments.\n");
        out.push_str("# TYPE quiverseg_segments gauge\n");
        out.push_str(&format!("quiverseg_segments {}\n", r.segments));

        out.push_str("# HELP quiverseg_segments_mapped Open segments with an active mmap.\n");
        out.push_str("# TYPE quiverseg_segments_mapped gauge\n");
        out.push_str(&format!("quiverseg_segments_mapped {}\n", r.mapped));

        out.push_str("# HELP quiverseg_segments_fallback_bytes Bytes of open segments served by file I/O.\n");
        out.push_str("# TYPE quiverseg_segments_fallback_bytes gauge\n");
        out.push_str(&format!("quiverseg_segments_fallback_bytes {}\n", r.fallback_bytes));
    }

    out
}
