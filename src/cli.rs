use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analysis::{
    AggregationOutcome, Aggregator, AliasMap, GitAccessor, HistoryAccessor, ProgressReporter,
    RevisionQuery,
};
use crate::config::Config;
use crate::report::{render, Column, OutputFormat, SortBy};
use crate::types::CollateBy;

#[derive(Parser)]
#[command(name = "authorstats")]
#[command(about = "Per-author commit and line statistics for a Git repository")]
#[command(version)]
pub struct Cli {
    #[arg(help = "Path to the git repository, or a URL to clone")]
    pub repository: String,

    #[arg(long, help = "Branch to analyze [default: master]")]
    pub branch: Option<String>,

    #[arg(long, help = "Only count commits authored on or after this date (YYYY-MM-DD)")]
    pub since: Option<NaiveDate>,

    #[arg(long, help = "Only count commits authored on or before this date (YYYY-MM-DD)")]
    pub until: Option<NaiveDate>,

    #[arg(long, help = "Maximum number of commits to analyze")]
    pub max_count: Option<usize>,

    #[arg(
        long = "by",
        value_enum,
        help = "Collate authors by name, email, or both [default: both]"
    )]
    pub collate_by: Option<CollateBy>,

    #[arg(long, value_enum, help = "Output format [default: plaintext]")]
    pub output: Option<OutputFormat>,

    #[arg(long, value_enum, help = "Column to sort on [default: edits]")]
    pub sort: Option<SortBy>,

    #[arg(long, help = "Maximum number of output rows")]
    pub limit: Option<usize>,

    #[arg(long, value_enum, value_delimiter = ',', help = "Comma-separated report columns")]
    pub columns: Vec<Column>,

    #[arg(long, help = "File mapping emails to author names (email = name)")]
    pub alias: Option<PathBuf>,

    #[arg(long, help = "Number of parallel workers")]
    pub workers: Option<usize>,

    #[arg(long, help = "Per-commit timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Retries for a failed git call")]
    pub retries: Option<u32>,

    #[arg(long, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(long, short, help = "Hide the progress bar")]
    pub quiet: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// File (or default) configuration with command-line overrides applied.
    pub fn resolve_config(&self) -> crate::error::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::load_default()?,
        };

        if let Some(branch) = &self.branch {
            config.branch = branch.clone();
        }
        if let Some(collate_by) = self.collate_by {
            config.collate_by = collate_by;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(sort) = self.sort {
            config.sort_by = sort;
        }
        if let Some(alias) = &self.alias {
            config.alias_file = Some(alias.clone());
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        Ok(config)
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.resolve_config().context("Failed to load configuration")?;
        let aliases = match &config.alias_file {
            Some(path) => AliasMap::load(path).context("Failed to load alias file")?,
            None => AliasMap::new(),
        };

        // Keeps a cloned checkout alive until the report is printed
        let (accessor, _checkout) = GitAccessor::acquire(&self.repository)
            .await
            .context("Failed to open git repository")?;
        let query = RevisionQuery {
            branch: config.branch.clone(),
            since: self.since,
            until: self.until,
            max_count: self.max_count,
        };
        let ids = accessor
            .list_revisions(&query)
            .await
            .context("Failed to list revisions")?;
        info!("Found {} commits on {}", ids.len(), query.branch);

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping aggregation");
                interrupt.cancel();
            }
        });

        let total = ids.len() as u64;
        let (progress, reporter) = if self.quiet {
            ProgressReporter::hidden(total)
        } else {
            ProgressReporter::stderr(total)
        };
        let outcome = Aggregator::from_config(Arc::new(accessor), &config, aliases)
            .run(ids, cancel, Some(progress))
            .await;
        reporter.finish().await;

        let ledger = match outcome.context("Aggregation failed")? {
            AggregationOutcome::Completed(ledger) => ledger,
            AggregationOutcome::Cancelled { merged, total, .. } => {
                bail!("Aggregation cancelled after {merged}/{total} commits; no report produced")
            }
        };

        let total_edits = ledger.total_edits();
        let mut authors = ledger.into_sorted(config.sort_by);
        if let Some(limit) = self.limit {
            authors.truncate(limit);
        }
        let columns = if self.columns.is_empty() {
            Column::defaults(config.collate_by)
        } else {
            self.columns.clone()
        };

        print!("{}", render(config.output, &columns, &authors, total_edits)?);
        Ok(())
    }
}
