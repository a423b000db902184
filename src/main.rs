mod app;
mod cli;
mod config;
mod lastfm;
mod paths;
mod schedule;
mod signer;
mod spinitron;
#[cfg(test)]
mod testserver;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = cli::Cli::parse();
    app::run(cli)
}
