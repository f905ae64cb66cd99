use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI для QuiverSeg: mmap сегментов с общим бюджетом
#[derive(Parser, Debug)]
#[command(name = "quiverseg", version, about = "QuiverSeg segment mmap CLI")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Overrides on top of P1_MMAP_* env configuration.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Log and ignore mmap failures (fall back to file I/O)
    #[arg(long, global = true)]
    pub ignore_mmap_errors: bool,
    /// Max concurrently mapped bytes (0 = unlimited)
    #[arg(long, global = true)]
    pub max_mmap_bytes: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Open a segment, hint mmap and print its state
    Stat {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Read [start, end) from a segment
    Read {
        path: PathBuf,
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Defaults to the segment size
        #[arg(long)]
        end: Option<u64>,
        /// Print a hex dump instead of text
        #[arg(long)]
        hex: bool,
        /// Never map; serve through positioned reads
        #[arg(long)]
        no_mmap: bool,
    },
    /// Compare CRC32C of mapped vs. file I/O reads chunk by chunk
    Verify {
        path: PathBuf,
        #[arg(long, default_value_t = 1 << 20)]
        chunk: u64,
        #[arg(long)]
        json: bool,
    },
    /// Open every file of a directory and pre-warm mmaps under the budget
    Warm {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
}
