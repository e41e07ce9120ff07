use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Defaults for the REPL, layered from `swarm.toml` and `SWARM_*` variables.
///
/// Command line flags take precedence over everything loaded here.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_turns: Option<usize>,
    /// Per provider call, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Settings {
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .set_default("agent", default_agent())?
            .set_default("log_level", default_log_level())?
            .add_source(File::with_name("swarm").required(false))
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("SWARM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = config
            .try_deserialize()
            .context("Failed to load swarm settings")?;
        tracing::debug!(?settings, "loaded settings");
        Ok(settings)
    }
}

fn default_agent() -> String {
    "coordinator".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
