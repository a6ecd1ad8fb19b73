//! Tidepool command-line entry point
//!
//! Fetches one or more documents while honouring robots.txt and per-domain
//! rate limits, and prints their extracted text.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tidepool::config::{load_config_with_hash, Config, UnreachablePolicy};
use tidepool::output::{render, render_batch, OutputFormat};
use tidepool::Pipeline;
use tracing_subscriber::EnvFilter;

/// Tidepool: a compliance-aware document harvester
///
/// Tidepool downloads PDF, Word, HTML, and RSS/Atom documents, respecting
/// robots.txt and per-domain rate limits, and converts them to plain text
/// with metadata.
#[derive(Parser, Debug)]
#[command(name = "tidepool")]
#[command(version)]
#[command(about = "A compliance-aware document harvester", long_about = None)]
struct Cli {
    /// URLs to fetch and extract
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Minimum delay between requests to the same domain (milliseconds)
    #[arg(long, value_name = "MS")]
    delay: Option<u64>,

    /// Maximum concurrent requests per domain
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Maximum concurrent requests across all domains
    #[arg(long, value_name = "N")]
    global_concurrency: Option<u32>,

    /// User agent sent with requests and matched against robots.txt
    #[arg(long)]
    user_agent: Option<String>,

    /// Decision when robots.txt is unreachable
    #[arg(long, value_enum)]
    on_unreachable: Option<Unreachable>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Unreachable {
    Permissive,
    Restrictive,
}

impl From<Unreachable> for UnreachablePolicy {
    fn from(value: Unreachable) -> Self {
        match value {
            Unreachable::Permissive => UnreachablePolicy::Permissive,
            Unreachable::Restrictive => UnreachablePolicy::Restrictive,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidepool=info,warn"),
            1 => EnvFilter::new("tidepool=debug,info"),
            2 => EnvFilter::new("tidepool=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs the pipeline over every URL; returns whether all of them succeeded
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_effective_config(&cli)?;
    let pipeline = Pipeline::new(config).context("Failed to start pipeline")?;

    let outcomes: Vec<_> = cli
        .urls
        .iter()
        .cloned()
        .zip(pipeline.process_many(&cli.urls).await)
        .collect();

    let mut all_ok = true;
    for (url, outcome) in &outcomes {
        if let Err(e) = outcome {
            all_ok = false;
            tracing::error!("{}: {} ({})", url, e, e.kind().remediation());
        }
    }

    let rendered = match outcomes.as_slice() {
        [(url, Ok(result))] => render(url, result, cli.format)?,
        [(_, Err(_))] => return Ok(false),
        _ => render_batch(&outcomes, cli.format)?,
    };

    match &cli.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", rendered),
    }

    Ok(all_ok)
}

/// Loads the config file (if any) and applies command-line overrides
fn load_effective_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(delay) = cli.delay {
        config.pipeline.default_delay_ms = delay;
    }
    if let Some(concurrency) = cli.concurrency {
        config.pipeline.default_concurrency = concurrency;
    }
    if let Some(limit) = cli.global_concurrency {
        config.pipeline.global_concurrency = limit;
    }
    if let Some(user_agent) = &cli.user_agent {
        config.pipeline.user_agent = user_agent.clone();
    }
    if let Some(policy) = cli.on_unreachable {
        config.robots.on_unreachable = policy.into();
    }

    Ok(config)
}
