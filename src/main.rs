//! Berth - Portainer stack deployment CLI
//!
//! This is the main CLI entry point for Berth.

use berth::commands::{Dispatcher, Options, Outcome};
use berth::config::{Environment, Settings};
use berth::deploy::TerminalSink;
use berth::error::Result;
use berth::portainer::PortainerClient;
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Berth - deploy Docker Swarm stacks through Portainer
#[derive(Parser)]
#[command(name = "berth")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Deploy Docker Swarm stacks through Portainer", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file (default: ./berth.toml, then the user config dir)
    #[arg(short, long, global = true, env = "BERTH_CONFIG")]
    config: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    force: bool,

    /// Do not wait for services to become ready after a deploy
    #[arg(long, global = true)]
    no_wait: bool,

    /// Readiness timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Seconds between readiness checks
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the Portainer connection and list stacks
    Test,

    /// Create an environment's stack and secrets
    Bootstrap {
        /// Target environment
        #[arg(value_enum)]
        environment: Environment,
        /// Image tag to run
        image_tag: String,
    },

    /// Update an environment's stack to a new image tag
    Deploy {
        /// Target environment
        #[arg(value_enum)]
        environment: Environment,
        /// Image tag to roll out
        image_tag: String,
    },

    /// Show stack and service status
    Status {
        /// Show one environment in detail
        #[arg(value_enum)]
        environment: Option<Environment>,
    },

    /// Delete an environment's stack
    Delete {
        /// Target environment
        #[arg(value_enum)]
        environment: Environment,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(timeout) = cli.timeout {
        settings.poll.timeout_secs = timeout;
    }
    if let Some(interval) = cli.poll_interval {
        settings.poll.interval_secs = interval;
    }

    settings.validate()?;

    let client = PortainerClient::new(settings.portainer_config()?)?;
    let options = Options {
        force: cli.force,
        no_wait: cli.no_wait,
    };

    let mut out = io::stdout();
    let mut input = io::stdin().lock();
    let mut sink = TerminalSink::stdout();
    let mut dispatcher = Dispatcher::new(
        &settings,
        &client,
        options,
        &mut out,
        &mut input,
        &mut sink,
    );

    match cli.command {
        Commands::Test => dispatcher.test().await,
        Commands::Bootstrap {
            environment,
            image_tag,
        } => dispatcher.bootstrap(environment, &image_tag).await,
        Commands::Deploy {
            environment,
            image_tag,
        } => dispatcher.deploy(environment, &image_tag).await,
        Commands::Status { environment } => dispatcher.status(environment).await,
        Commands::Delete { environment } => dispatcher.delete(environment).await,
    }
}
