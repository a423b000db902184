pub mod engine;
mod setup;


use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::lastfm::LastfmClient;
use crate::paths::config_file_path;
use crate::spinitron::SpinitronClient;

use self::engine::{Engine, Shutdown};

static PROCESS_SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };
    let config = Config::load(&config_path)?;

    match cli.command {
        Some(Command::Setup) => setup::run_setup(&config, &config_path),
        Some(Command::Run) | None => run_engine(&config, &config_path),
    }
}

fn run_engine(config: &Config, config_path: &Path) -> Result<()> {
    config
        .validate_for_run()
        .with_context(|| format!("config {} is not ready for run mode", config_path.display()))?;
    let session_key = config
        .lastfm
        .session_key
        .as_deref()
        .context("session key missing after validation")?;

    install_sigint_handler()?;
    let shutdown = Shutdown::new(&PROCESS_SHUTDOWN);

    let feed = SpinitronClient::new(&config.spinitron.api_key);
    let reporter = LastfmClient::new(&config.lastfm.api_key, &config.lastfm.api_secret)
        .with_session_key(session_key);

    if config.schedule.is_open_all_day() {
        info!("scrobbler starting; reporting around the clock (Ctrl+C to stop)");
    } else {
        info!(
            "scrobbler starting; reporting between {}:00 and {}:00 UTC (Ctrl+C to stop)",
            config.schedule.start_hour, config.schedule.end_hour
        );
    }

    let mut engine = Engine::new(&feed, &reporter, config.schedule, shutdown);
    engine.run();
    Ok(())
}

#[cfg(unix)]
fn install_sigint_handler() -> Result<()> {
    // Only the atomic store happens here; safe in a signal context.
    extern "C" fn handle_sigint(_signal: libc::c_int) {
        Shutdown::new(&PROCESS_SHUTDOWN).trigger();
    }

    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_sigint as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(anyhow!("failed to install SIGINT handler"));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn install_sigint_handler() -> Result<()> {
    Ok(())
}
