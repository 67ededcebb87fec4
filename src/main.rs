//! product-harvest CLI
//!
//! Fetches product details for every identifier in a CSV file and writes them as
//! batched JSON files plus per-category error logs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use product_harvest::{Config, Event, Harvester, Strategy, load_identifiers};

#[derive(Parser)]
#[command(name = "product-harvest")]
#[command(about = "Bulk-fetch product details with bounded concurrency and retries", long_about = None)]
struct Cli {
    /// Path to a JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every identifier listed in the input file
    Run {
        /// CSV file whose first column holds the identifiers
        #[arg(short, long)]
        input: PathBuf,

        /// Override concurrency level
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override scheduling strategy (buffered, semaphore, pool, sequential)
        #[arg(long)]
        strategy: Option<Strategy>,

        /// The input file has no header row
        #[arg(long)]
        no_header: bool,

        /// Also write the summary as JSON to this path
        #[arg(long)]
        summary_out: Option<PathBuf>,

        /// Log a progress line every N completed identifiers
        #[arg(long, default_value_t = 1000)]
        progress_every: usize,
    },

    /// Validate configuration
    Validate,

    /// Generate a configuration file with every default filled in
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "harvest.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            concurrency,
            strategy,
            no_header,
            summary_out,
            progress_every,
        } => {
            let mut config = load_config(cli.config.as_deref())?;

            // Apply overrides
            if let Some(c) = concurrency {
                config.fetch.concurrency = c;
            }
            if let Some(s) = strategy {
                config.fetch.strategy = s;
            }

            run_command(config, &input, !no_header, summary_out, progress_every).await?;
        }

        Commands::Validate => {
            let config = load_config(cli.config.as_deref())?;
            config.validate()?;
            println!("Configuration is valid");
        }

        Commands::GenerateConfig { output } => {
            let json = serde_json::to_string_pretty(&Config::default())?;
            std::fs::write(&output, json)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

async fn run_command(
    config: Config,
    input: &Path,
    has_header: bool,
    summary_out: Option<PathBuf>,
    progress_every: usize,
) -> Result<()> {
    let ids = load_identifiers(input, has_header)?;
    let harvester = Harvester::new(config).context("setting up harvester")?;

    let total = ids.len();
    let mut events = harvester.subscribe();
    let progress = tokio::spawn(async move {
        let mut completed = 0usize;
        loop {
            match events.recv().await {
                Ok(Event::Fetched { .. } | Event::Failed { .. }) => {
                    completed += 1;
                    if progress_every > 0 && completed % progress_every == 0 {
                        tracing::info!(completed, total, "Progress");
                    }
                }
                Ok(Event::Finished { .. }) => break,
                Ok(Event::BatchSaved { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    completed += usize::try_from(skipped).unwrap_or(usize::MAX);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let summary = harvester.run(ids).await?;
    progress.abort();

    println!("\n{summary}");

    if let Some(path) = summary_out {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}
