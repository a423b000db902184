use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::schedule::ScheduleWindow;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub lastfm: LastfmConfig,
    pub spinitron: SpinitronConfig,
    pub schedule: ScheduleWindow,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LastfmConfig {
    pub api_key: String,
    pub api_secret: String,
    /// Obtained via `spinscrobble setup`; absent until then.
    pub session_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpinitronConfig {
    pub api_key: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config TOML {}", path.display()))
    }

    /// Checks everything `setup` needs: API keys present and not left as
    /// the sample placeholder values.
    pub fn validate_keys(&self) -> Result<()> {
        if is_placeholder(&self.lastfm.api_key)
            || is_placeholder(&self.lastfm.api_secret)
            || is_placeholder(&self.spinitron.api_key)
        {
            bail!(
                "please set lastfm.api_key, lastfm.api_secret and spinitron.api_key \
                 in the config file"
            );
        }
        if self.schedule.start_hour >= 24 || self.schedule.end_hour >= 24 {
            bail!("schedule hours must be in the range 0-23");
        }
        Ok(())
    }

    /// Checks everything `run` needs, which is `validate_keys` plus an
    /// established session key.
    pub fn validate_for_run(&self) -> Result<()> {
        self.validate_keys()?;
        match &self.lastfm.session_key {
            Some(key) if !is_placeholder(key) => Ok(()),
            _ => bail!(
                "no usable lastfm.session_key in the config file; \
                 run `spinscrobble setup` first"
            ),
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    value.is_empty() || value.chars().all(|c| c.eq_ignore_ascii_case(&'x'))
}

/// Writes a freshly obtained session key back into the config file,
/// preserving the other entries.
pub fn store_session_key(path: &Path, session_key: &str) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let mut value: toml::Table = contents
        .parse()
        .with_context(|| format!("failed to parse config TOML {}", path.display()))?;

    let lastfm = value
        .entry("lastfm")
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    match lastfm.as_table_mut() {
        Some(table) => {
            table.insert(
                "session_key".to_string(),
                toml::Value::String(session_key.to_string()),
            );
        }
        None => bail!("config [lastfm] entry is not a table"),
    }

    let rendered = toml::to_string(&value).context("failed to render config TOML")?;
    std::fs::write(path, rendered)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}
