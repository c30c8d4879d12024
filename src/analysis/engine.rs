use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::accessor::HistoryAccessor;
use super::collate::AliasMap;
use super::extract::{extract_commit, ExtractPolicy};
use super::ledger::Ledger;
use super::progress::ProgressHandle;
use crate::config::{default_worker_count, Config};
use crate::error::{Result, StatsError};
use crate::types::CollateBy;

/// Lifecycle of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Non-error result of a run.
#[derive(Debug)]
pub enum AggregationOutcome {
    /// Every commit was merged.
    Completed(Ledger),
    /// Dispatch stopped early; `ledger` holds exactly the `merged` commits.
    Cancelled { ledger: Ledger, merged: usize, total: usize },
}

impl AggregationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, AggregationOutcome::Completed(_))
    }

    /// The ledger of a completed run.
    pub fn completed(self) -> Option<Ledger> {
        match self {
            AggregationOutcome::Completed(ledger) => Some(ledger),
            AggregationOutcome::Cancelled { .. } => None,
        }
    }
}

/// State shared by the workers of one run.
struct RunShared {
    ids: Vec<String>,
    cursor: AtomicUsize,
    ledger: Mutex<Ledger>,
    merged: AtomicUsize,
    failure: Mutex<Option<StatsError>>,
}

impl RunShared {
    fn next_id(&self) -> Option<&str> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.ids.get(idx).map(String::as_str)
    }

    /// Keep the first failure; later ones are consequences of the abort.
    fn fail(&self, err: StatsError) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(err);
        }
    }
}

/// Per-worker view of the run configuration.
#[derive(Clone)]
struct WorkerContext {
    shared: Arc<RunShared>,
    accessor: Arc<dyn HistoryAccessor>,
    aliases: Arc<AliasMap>,
    collate_by: CollateBy,
    policy: ExtractPolicy,
    stop: CancellationToken,
    progress: Option<ProgressHandle>,
}

async fn run_worker(ctx: WorkerContext) {
    loop {
        if ctx.stop.is_cancelled() {
            break;
        }
        let Some(id) = ctx.shared.next_id() else {
            break;
        };

        // No lock is held while the accessor runs
        let extracted = tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => break,
            result = extract_commit(ctx.accessor.as_ref(), id, &ctx.policy) => result,
        };

        let record = match extracted {
            Ok(record) => record,
            Err(e) => {
                error!("Aborting aggregation: {}", e);
                ctx.shared.fail(e);
                ctx.stop.cancel();
                break;
            }
        };

        let name = ctx.aliases.resolve(&record.author_name, &record.author_email);
        let key = ctx.collate_by.key(name, &record.author_email);
        {
            let mut ledger = ctx.shared.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.merge(key, name, &record);
        }
        ctx.shared.merged.fetch_add(1, Ordering::SeqCst);
        debug!("Merged commit {} ({} +{} -{})", record.id, name, record.added(), record.deleted());

        if let Some(progress) = &ctx.progress {
            progress.tick();
        }
    }
}

/// Concurrent aggregation engine.
///
/// Pulls commit ids from a shared cursor with a fixed pool of workers,
/// extracts each one through the accessor and merges it into a [`Ledger`].
/// An aggregator runs once; subscribe to its state before calling
/// [`run`](Self::run).
pub struct Aggregator {
    accessor: Arc<dyn HistoryAccessor>,
    workers: usize,
    policy: ExtractPolicy,
    aliases: Arc<AliasMap>,
    collate_by: CollateBy,
    state: watch::Sender<EngineState>,
}

impl Aggregator {
    pub fn new(accessor: Arc<dyn HistoryAccessor>) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        Self {
            accessor,
            workers: default_worker_count(),
            policy: ExtractPolicy::default(),
            aliases: Arc::new(AliasMap::new()),
            collate_by: CollateBy::default(),
            state,
        }
    }

    pub fn from_config(
        accessor: Arc<dyn HistoryAccessor>,
        config: &Config,
        aliases: AliasMap,
    ) -> Self {
        Self::new(accessor)
            .with_workers(config.worker_count())
            .with_policy(ExtractPolicy {
                timeout: config.timeout(),
                retries: config.retries,
                backoff: config.retry_backoff(),
            })
            .with_aliases(aliases)
            .with_collate_by(config.collate_by)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_policy(mut self, policy: ExtractPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = Arc::new(aliases);
        self
    }

    pub fn with_collate_by(mut self, collate_by: CollateBy) -> Self {
        self.collate_by = collate_by;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Aggregate `ids`.
    ///
    /// Any extraction error aborts the run and is returned as-is; no partial
    /// ledger escapes. Cancelling `cancel` stops dispatch and abandons
    /// in-flight extractions, yielding [`AggregationOutcome::Cancelled`]
    /// unless every commit had already been merged.
    pub async fn run(
        self,
        ids: Vec<String>,
        cancel: CancellationToken,
        progress: Option<ProgressHandle>,
    ) -> Result<AggregationOutcome> {
        let start_time = Instant::now();
        let total = ids.len();
        let pool_size = self.workers.min(total);
        self.state.send_replace(EngineState::Running);
        info!("Aggregating {} commits with {} workers", total, pool_size);

        let shared = Arc::new(RunShared {
            ids,
            cursor: AtomicUsize::new(0),
            ledger: Mutex::new(Ledger::new()),
            merged: AtomicUsize::new(0),
            failure: Mutex::new(None),
        });
        // Child token: a failing worker stops its peers without cancelling the caller's token
        let stop = cancel.child_token();

        let ctx = WorkerContext {
            shared: Arc::clone(&shared),
            accessor: Arc::clone(&self.accessor),
            aliases: Arc::clone(&self.aliases),
            collate_by: self.collate_by,
            policy: self.policy,
            stop: stop.clone(),
            progress,
        };
        let mut pool = JoinSet::new();
        for _ in 0..pool_size {
            pool.spawn(run_worker(ctx.clone()));
        }
        drop(ctx);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                shared.fail(StatsError::Worker(e.to_string()));
                stop.cancel();
            }
        }

        let failure = shared.failure.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(err) = failure {
            self.state.send_replace(EngineState::Failed);
            return Err(err);
        }

        let ledger = {
            let mut guard = shared.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        let merged = shared.merged.load(Ordering::SeqCst);
        let elapsed_secs = start_time.elapsed().as_secs_f64();

        if merged < total {
            warn!("Aggregation cancelled after {}/{} commits", merged, total);
            self.state.send_replace(EngineState::Cancelled);
            return Ok(AggregationOutcome::Cancelled { ledger, merged, total });
        }

        info!(
            "Processed {} commits in {:.2}s ({:.1} commits/sec), {} authors",
            total,
            elapsed_secs,
            total as f64 / elapsed_secs.max(f64::EPSILON),
            ledger.len()
        );
        self.state.send_replace(EngineState::Completed);
        Ok(AggregationOutcome::Completed(ledger))
    }
}
