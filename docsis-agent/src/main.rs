//! DOCSIS Agent - FRITZ!Box cable-modem metrics poller
//!
//! Logs in to the router, reads the DOCSIS channel overview and writes one
//! point per channel to InfluxDB. Runs a single cycle by default, or keeps
//! polling with `poll`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docsis_agent::sink::line_protocol::encode_point;
use docsis_agent::{Agent, AgentConfig, AgentError, ChannelMetricsMapper, DocInfo};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "docsis-agent", version, about = "FRITZ!Box DOCSIS channel metrics to InfluxDB")]
struct Cli {
    /// Config file (default: $DOCSIS_AGENT_CONFIG or the OS config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single poll cycle (default)
    Once,
    /// Poll repeatedly until interrupted
    Poll {
        /// Seconds between cycles (overrides poll.interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Write a config template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Read the router password from stdin and store it in the OS keyring
    StorePassword,
    /// Map a saved docInfo JSON file and print line protocol
    MapFile { path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e.downcast_ref::<AgentError>().map(AgentError::exit_code).unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "docsis_agent=debug" } else { "docsis_agent=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let path = AgentConfig::resolve_path(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Once) {
        Command::Once => {
            let config = AgentConfig::load(&path).await?;
            let agent = Agent::from_config(&config)?;
            let report = agent.poll_once().await?;
            if report.is_empty() {
                info!("Nothing written this cycle");
            }
        }

        Command::Poll { interval } => {
            let config = AgentConfig::load(&path).await?;
            let agent = Agent::from_config(&config)?;
            let secs = interval.unwrap_or(config.poll.interval_secs).max(1);
            agent.run_forever(Duration::from_secs(secs)).await;
        }

        Command::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AgentConfig::default()
                .save(&path)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Config template written to {}", path.display());
        }

        Command::StorePassword => {
            let config = AgentConfig::from_file_with_env(&path, |key| std::env::var(key).ok()).await?;
            if config.router.username.trim().is_empty() {
                return Err(AgentError::config("router.username must be set before storing a password").into());
            }
            let mut password = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut password)
                .context("Failed to read password from stdin")?;
            let password = password.trim_end_matches(['\r', '\n']);
            AgentConfig::save_password(&config.router.username, password)
                .context("Failed to store password in keyring")?;
            info!("Password for {} stored in keyring", config.router.username);
        }

        Command::MapFile { path: input } => {
            let body = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let doc_info = DocInfo::from_json(&body)?;
            let config = AgentConfig::from_file(&path).await?;
            let mapper = ChannelMetricsMapper::new(&config.influx.measurement);
            for point in mapper.map(&doc_info, chrono::Utc::now()) {
                println!("{}", encode_point(&point));
            }
        }
    }

    Ok(())
}
