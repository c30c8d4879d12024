//! Command-line entry point: aggregate per-author statistics for a repository
//! and print the report to stdout. Logs and progress go to stderr.

use anyhow::Result;
use authorstats::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Cli::parse().execute().await
}
