mod run;

use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sdbm-cli")]
#[command(about = "Collect SteamDB app metrics into the warehouse")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape the configured apps and merge the results (the default).
    Run {
        /// Delete today's rows before merging the new ones.
        #[arg(long)]
        clear_first: bool,
    },
    /// Delete every row scraped today (UTC) from the metrics table.
    ClearToday,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = sdbm_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let started = Instant::now();
    tracing::info!(env = %config.env, "sdbm collector starting");

    let result = match cli.command {
        Some(Commands::Run { clear_first }) => run::run_scrape(&config, clear_first).await,
        None => run::run_scrape(&config, false).await,
        Some(Commands::ClearToday) => run::run_clear_today(&config).await,
    };

    tracing::info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        ok = result.is_ok(),
        "sdbm collector finished"
    );
    result
}
