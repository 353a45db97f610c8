use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use klone::health::Status;
use klone::{Config, GitClient, GitHubClient, HealthReport, Klone};

#[derive(Parser)]
#[command(name = "klone")]
#[command(about = "Clone a GitHub repository with fork-aware remotes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Repository to klone: "name" (yours) or "owner/name"
    repository: Option<String>,

    /// Show what would happen without forking, cloning or changing remotes
    #[arg(long)]
    dry_run: bool,

    /// Give up after this many seconds (overrides sync.timeout)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check git, GitHub authentication and local directories
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging.level);
    debug!("klone v{}", env!("CARGO_PKG_VERSION"));

    match (cli.command, cli.repository) {
        (Some(Commands::Doctor), _) => cmd_doctor(&config).await,
        (None, Some(repository)) if cli.dry_run => cmd_plan(&repository, &config).await,
        (None, Some(repository)) => cmd_klone(&repository, cli.timeout, &config).await,
        (None, None) => bail!("Nothing to klone. Usage: klone <REPOSITORY>, see --help"),
    }
}

/// Initialize logging: RUST_LOG wins, then --verbose, then the configured level
fn init_logging(verbose: bool, configured: &str) {
    let fallback = if verbose { "debug" } else { configured };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

async fn build_klone(config: &Config) -> Result<Klone> {
    let github = GitHubClient::new(config).await?;
    let git = GitClient::new(config);
    Ok(Klone::new(config, Arc::new(github), Arc::new(git)))
}

/// Klone a repository and print its local path
async fn cmd_klone(repository: &str, timeout: Option<u64>, config: &Config) -> Result<()> {
    let mut klone = build_klone(config).await?;
    if let Some(secs) = timeout {
        klone = klone.with_timeout(Duration::from_secs(secs));
    }

    match klone.klone(repository).await {
        Ok(path) => {
            info!("Ready: {}", path.display());
            println!("{}", path.display());
            Ok(())
        }
        Err(e) => {
            if let Some(path) = e.local_path() {
                eprintln!("Checkout is at {}; run klone again to finish setting it up", path.display());
            }
            Err(e.into())
        }
    }
}

/// Dry run: classify and print the plan
async fn cmd_plan(repository: &str, config: &Config) -> Result<()> {
    let klone = build_klone(config).await?;
    let report = klone.plan(repository).await?;

    println!("Acting as {}", klone.acting_user());
    print!("{}", report);
    Ok(())
}

/// System health check and diagnostics
async fn cmd_doctor(config: &Config) -> Result<()> {
    let report = HealthReport::run(config).await;

    for check in &report.checks {
        println!("{}", check);
    }
    println!();

    if report.healthy() {
        let warnings = report.with_status(Status::Warning).count();
        println!("All checks passed ({} warnings)", warnings);
        Ok(())
    } else {
        let failed = report.with_status(Status::Error).count();
        bail!("{} check(s) failed", failed)
    }
}
