//! # Git Author Statistics Library
//!
//! `authorstats` computes per-author contribution statistics (commits, lines
//! inserted and removed, first and last commit date) from a repository's
//! history. Commits are extracted in parallel over a bounded worker pool and
//! folded into a [`Ledger`](analysis::Ledger) whose contents do not depend on
//! the order in which extractions finish.
//!
//! ## Features
//!
//! - Bounded, cancellable parallel extraction
//! - Collation by author name, email, or both
//! - Email alias files
//! - Plaintext, CSV, LaTeX, alias-file and JSON reports
//!
//! ## Example
//!
//! ```no_run
//! use authorstats::analysis::{Aggregator, GitAccessor, HistoryAccessor, RevisionQuery};
//! use authorstats::report::SortBy;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> authorstats::error::Result<()> {
//! let accessor = GitAccessor::open(".")?;
//! let ids = accessor.list_revisions(&RevisionQuery::new("main")).await?;
//!
//! let outcome = Aggregator::new(Arc::new(accessor))
//!     .with_workers(4)
//!     .run(ids, CancellationToken::new(), None)
//!     .await?;
//!
//! if let Some(ledger) = outcome.completed() {
//!     for author in ledger.into_sorted(SortBy::Edits) {
//!         println!("{} {} +{} -{}", author.name, author.commits, author.added, author.deleted);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod types;

// Re-export main types for convenience
pub use analysis::{AggregationOutcome, Aggregator, Ledger};
pub use error::{Result, StatsError};
pub use types::{AuthorKey, AuthorStats, CollateBy, CommitRecord};
