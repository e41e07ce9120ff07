mod agents;
mod repl;
mod settings;
mod tools;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use swarm::providers::base::ProviderKind;
use swarm::providers::configs::ProviderConfig;
use swarm::swarm::{RunOptions, Swarm};
use tracing_subscriber::EnvFilter;

use crate::agents::{demo_registry, find_agent};
use crate::repl::Repl;
use crate::settings::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agent to start the conversation with (coordinator or developer)
    #[arg(short, long)]
    agent: Option<String>,

    /// Model used for every agent instead of its own
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum completion requests per message
    #[arg(long)]
    max_turns: Option<usize>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Directory the developer agent works in (defaults to the current directory)
    #[arg(short, long)]
    workdir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::new()?;

    let log_file = cli.log_file.as_deref().or(settings.log_file.as_deref());
    init_logging(log_file, &settings.log_level)?;

    let workdir = match cli.workdir.or(settings.workdir) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let workdir = workdir
        .canonicalize()
        .with_context(|| format!("Invalid working directory {}", workdir.display()))?;

    // The registry must outlive the session, handoffs resolve through it
    let registry = demo_registry(&workdir)?;
    let agent = find_agent(&registry, cli.agent.as_deref().unwrap_or(&settings.agent))?;

    let mut options = RunOptions::default();
    options.model_override = cli.model.or(settings.model);
    options.max_turns = cli.max_turns.or(settings.max_turns);
    options.timeout = settings.timeout_secs.map(Duration::from_secs);

    let swarm = Swarm::from_configs(provider_configs())?;
    let mut repl = Repl::new(swarm, agent, options)?;
    repl.start().await
}

/// Configure every provider whose credentials are present
fn provider_configs() -> Vec<ProviderConfig> {
    [ProviderKind::OpenAi, ProviderKind::Anthropic]
        .into_iter()
        .filter_map(|kind| match ProviderConfig::from_env(kind) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!("{} provider unavailable: {}", kind, err);
                None
            }
        })
        .collect()
}

fn init_logging(log_file: Option<&Path>, default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
