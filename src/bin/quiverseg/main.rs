use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_stat;
mod cmd_read;
mod cmd_verify;
mod cmd_warm;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт info.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let g = &cli.global;
    match cli.cmd {
        cli::Cmd::Stat { path, json } =>
            cmd_stat::exec(g, path, json),

        cli::Cmd::Read { path, start, end, hex, no_mmap } =>
            cmd_read::exec(g, path, start, end, hex, no_mmap),

        cli::Cmd::Verify { path, chunk, json } =>
            cmd_verify::exec(g, path, chunk, json),

        cli::Cmd::Warm { dir, json } =>
            cmd_warm::exec(g, dir, json),
    }
}
