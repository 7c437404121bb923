//! CLI for hydrating tweet ids
//!
//! Settings come from defaults, then `.env`/environment, then flags.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hydrator::{logging, status, HydrateConfig, HydrationOrchestrator, PersistMode};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use twitter_client::TwitterClient;

/// sysexits EX_TEMPFAIL: the run stopped on a rate limit and can be retried.
const EXIT_RATE_LIMITED: u8 = 75;

#[derive(Parser)]
#[command(name = "hydrate")]
#[command(about = "Hydrate tweet ids into a resumable CSV dataset")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand)]
enum Commands {
    /// Hydrate every tweet id not yet in the result file (default)
    Run,

    /// Show progress counts without calling the API
    Status,
}

#[derive(Args)]
struct Overrides {
    /// Tab-separated input with a `tweet_id` column
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Result CSV
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Append-only list of attempted ids
    #[arg(long, global = true)]
    progress: Option<PathBuf>,

    /// Ids not resolved by the last run
    #[arg(long, global = true)]
    missing: Option<PathBuf>,

    /// Log file
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Ids per lookup request (1-100)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Pause between batches
    #[arg(long, global = true)]
    batch_delay_secs: Option<u64>,

    /// Wait after a rate-limit response
    #[arg(long, global = true)]
    cooldown_secs: Option<u64>,

    /// Cooldowns allowed per batch before stopping the run
    #[arg(long, global = true)]
    max_rate_limit_retries: Option<u32>,

    /// How the result CSV is written after each batch
    #[arg(long, global = true, value_enum)]
    persist_mode: Option<PersistMode>,

    /// Disable the progress bar
    #[arg(long, global = true)]
    no_progress: bool,
}

impl Overrides {
    fn apply(&self, mut config: HydrateConfig) -> HydrateConfig {
        if let Some(path) = &self.input {
            config = config.with_input_path(path);
        }
        if let Some(path) = &self.output {
            config = config.with_output_path(path);
        }
        if let Some(path) = &self.progress {
            config = config.with_progress_path(path);
        }
        if let Some(path) = &self.missing {
            config = config.with_missing_path(path);
        }
        if let Some(path) = &self.log {
            config = config.with_log_path(path);
        }
        if let Some(size) = self.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(secs) = self.batch_delay_secs {
            config = config.with_batch_delay(Duration::from_secs(secs));
        }
        if let Some(secs) = self.cooldown_secs {
            config = config.with_rate_limit_cooldown(Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_rate_limit_retries {
            config = config.with_max_rate_limit_retries(retries);
        }
        if let Some(mode) = self.persist_mode {
            config = config.with_persist_mode(mode);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = cli
        .overrides
        .apply(HydrateConfig::from_env().context("Failed to load configuration")?);
    config.validate().context("Invalid configuration")?;

    logging::init(&config.log_path).context("Failed to initialize logging")?;

    log_failure(execute(&cli, config).await)
}

async fn execute(cli: &Cli, config: HydrateConfig) -> Result<ExitCode> {
    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Status => {
            let report = status(&config).context("Failed to read hydration status")?;
            println!("{}", report);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run => {
            let mut client = TwitterClient::from_env().context("Failed to create X API client")?;
            if let Some(url) = &config.api_base_url {
                client = client.with_base_url(url);
            }

            let progress = if cli.overrides.no_progress {
                ProgressBar::hidden()
            } else {
                create_progress_bar()
            };

            let summary = HydrationOrchestrator::new(config, client)
                .with_progress_bar(progress)
                .run()
                .await
                .context("Hydration failed")?;

            if summary.halted.is_some() {
                return Ok(ExitCode::from(EXIT_RATE_LIMITED));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Send a fatal error to the log file before it ends the process.
fn log_failure<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg} [{bar:40.cyan/dim}] {pos}/{len} batches ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
