use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "spinscrobble",
    version,
    about = "Scrobble a Spinitron station's spins to a Last.fm profile"
)]
pub struct Cli {
    /// Path to the config TOML file (defaults to the OS config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the station feed and report spins (default)
    Run,
    /// One-time Last.fm authorization to obtain a session key
    Setup,
}
