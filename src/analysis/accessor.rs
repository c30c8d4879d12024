use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use git2::{Commit, Repository};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::task::spawn_blocking;
use tracing::info;

use crate::error::{Result, StatsError};

/// Filters for listing the commits of one branch.
#[derive(Debug, Clone)]
pub struct RevisionQuery {
    pub branch: String,
    /// Inclusive lower bound on the author date
    pub since: Option<NaiveDate>,
    /// Inclusive upper bound on the author date
    pub until: Option<NaiveDate>,
    pub max_count: Option<usize>,
}

impl RevisionQuery {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            since: None,
            until: None,
            max_count: None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(since) = self.since {
            if date < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if date > until {
                return false;
            }
        }
        true
    }

    fn has_date_filter(&self) -> bool {
        self.since.is_some() || self.until.is_some()
    }
}

/// Capability to read a repository's revision history.
///
/// `show_commit` returns the raw record text: a `name#email#date` header line
/// followed by numstat lines. Implementations must be safe to call from many
/// workers at once.
#[async_trait]
pub trait HistoryAccessor: Send + Sync {
    /// Commit identifiers reachable from the query's branch, in no particular order.
    async fn list_revisions(&self, query: &RevisionQuery) -> Result<Vec<String>>;

    /// Raw record text for one commit.
    async fn show_commit(&self, id: &str) -> Result<String>;
}

/// Accessor backed by a local Git repository.
///
/// Listing walks history with `git2`; each commit is shown by a `git show`
/// child process, which is killed if the caller stops waiting for it.
#[derive(Debug, Clone)]
pub struct GitAccessor {
    repo_path: PathBuf,
    git_binary: PathBuf,
}

impl GitAccessor {
    /// Open the repository at `path`, failing early if it is not one.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path.as_ref()).map_err(|e| {
            StatsError::Repository(format!("{}: {}", path.as_ref().display(), e.message()))
        })?;
        let repo_path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self {
            repo_path,
            git_binary: PathBuf::from("git"),
        })
    }

    /// Clone `url` into `dest` and open the fresh checkout.
    pub async fn clone_from(url: &str, dest: &Path) -> Result<Self> {
        // git2 operations are blocking
        let source = url.to_string();
        let target = dest.to_path_buf();
        spawn_blocking(move || Repository::clone(&source, &target).map(|_| ()))
            .await
            .map_err(|e| StatsError::Repository(e.to_string()))?
            .map_err(|e| {
                StatsError::Repository(format!("failed to clone {}: {}", url, e.message()))
            })?;

        info!("Cloned {} into {}", url, dest.display());
        Self::open(dest)
    }

    /// Open `source` if it is a local directory, otherwise clone it into a
    /// temporary directory. The returned [`TempDir`] owns that clone and must
    /// outlive every use of the accessor.
    pub async fn acquire(source: &str) -> Result<(Self, Option<TempDir>)> {
        if Path::new(source).is_dir() {
            return Ok((Self::open(source)?, None));
        }

        let workdir = TempDir::new()?;
        let accessor = Self::clone_from(source, workdir.path()).await?;
        Ok((accessor, Some(workdir)))
    }

    /// Use a specific `git` executable instead of the one on `PATH`.
    pub fn with_git_binary(mut self, git_binary: impl Into<PathBuf>) -> Self {
        self.git_binary = git_binary.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.repo_path
    }
}

/// Author date in the author's own timezone, matching `git log --format=%as`.
fn author_date(commit: &Commit<'_>) -> Result<NaiveDate> {
    let when = commit.author().when();
    let local_secs = when.seconds() + i64::from(when.offset_minutes()) * 60;
    DateTime::from_timestamp(local_secs, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| {
            StatsError::Repository(format!("Invalid timestamp on commit {}", commit.id()))
        })
}

fn list_blocking(repo_path: &Path, query: &RevisionQuery) -> Result<Vec<String>> {
    let repo = Repository::open(repo_path)?;
    // A fresh clone only has the default branch locally; others live under origin/
    let head = repo
        .resolve_reference_from_short_name(&query.branch)
        .or_else(|_| {
            repo.resolve_reference_from_short_name(&format!("origin/{}", query.branch))
        })
        .and_then(|reference| reference.peel_to_commit())
        .map_err(|_| {
            StatsError::Repository(format!("Branch '{}' does not exist", query.branch))
        })?;

    let mut revwalk = repo.revwalk()?;
    revwalk.push(head.id())?;

    let mut ids = Vec::new();
    for oid in revwalk {
        if query.max_count.is_some_and(|limit| ids.len() >= limit) {
            break;
        }

        let oid = oid?;
        if query.has_date_filter() {
            let commit = repo.find_commit(oid)?;
            if !query.contains(author_date(&commit)?) {
                continue;
            }
        }
        ids.push(oid.to_string());
    }

    Ok(ids)
}

#[async_trait]
impl HistoryAccessor for GitAccessor {
    async fn list_revisions(&self, query: &RevisionQuery) -> Result<Vec<String>> {
        // git2 operations are blocking
        let repo_path = self.repo_path.clone();
        let query = query.clone();
        spawn_blocking(move || list_blocking(&repo_path, &query))
            .await
            .map_err(|e| StatsError::Repository(e.to_string()))?
    }

    async fn show_commit(&self, id: &str) -> Result<String> {
        let output = Command::new(&self.git_binary)
            .arg("-C")
            .arg(&self.repo_path)
            .args(["show", "--no-color", "--numstat", "--format=%an#%ae#%as", id])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StatsError::accessor(id, format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StatsError::accessor(
                id,
                format!("git show exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
