//! One audit run: source → partition → worker pool → aggregator.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::model::WorkItem;
use crate::partition::partition;
use crate::pool::{join_workers, Aggregator, RunSummary, WorkerPool, WorkerReport};
use crate::source::{SourceError, SourceQuery, WorkSource};

/// Failures that stop a run before any probe is sent.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone)]
pub struct AuditReport {
    pub summary: RunSummary,
    /// False when the run ended before every item had an outcome: the
    /// deadline expired or a worker died.
    pub complete: bool,
    pub workers: Vec<WorkerReport>,
}

/// Query `source`, then probe everything it returned.
pub async fn execute(
    source: &dyn WorkSource,
    query: &SourceQuery,
    pool: &WorkerPool,
    worker_count: usize,
    deadline: Option<Duration>,
) -> Result<AuditReport, AuditError> {
    let items = source.query(query)?;
    info!(
        shuttle = %query.location,
        from = %query.from,
        to = %query.to,
        total = items.len(),
        "CIDs selected for audit"
    );
    run_audit(items, pool, worker_count, deadline).await
}

/// Probe `items` across `worker_count` workers and wait for every outcome.
/// The wait also ends when every worker has exited, or once `deadline`
/// passes; outstanding workers are then aborted and the report is marked
/// incomplete.
pub async fn run_audit(
    items: Vec<WorkItem>,
    pool: &WorkerPool,
    worker_count: usize,
    deadline: Option<Duration>,
) -> Result<AuditReport, AuditError> {
    let total = items.len();
    let shares = partition(items, worker_count)?;
    info!(
        total,
        workers = worker_count,
        per_share = total / worker_count,
        remainder = total % worker_count,
        "Work partitioned"
    );

    let aggregator = Arc::new(Aggregator::new());
    let handles = pool.spawn(shares, Arc::clone(&aggregator));
    let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();

    let settling = settle(&aggregator, total, handles);
    tokio::pin!(settling);
    let workers = match deadline {
        None => settling.await,
        Some(limit) => match tokio::time::timeout(limit, &mut settling).await {
            Ok(workers) => workers,
            Err(_) => {
                warn!(
                    deadline_secs = limit.as_secs_f64(),
                    completed = aggregator.snapshot().completed,
                    total,
                    "Run deadline expired, aborting outstanding workers"
                );
                for handle in &aborts {
                    handle.abort();
                }
                settling.await
            }
        },
    };

    // Every handle has resolved, so nothing can be observed after this.
    let mut summary = aggregator.snapshot();
    summary.total_items = total;
    let complete = summary.is_complete();
    if !complete {
        warn!(
            completed = summary.completed,
            total,
            "Run ended before every item had an outcome"
        );
    }

    info!(
        total = summary.total_items,
        completed = summary.completed,
        available = summary.available,
        unavailable = summary.unavailable_total(),
        unreachable = summary.unreachable_total(),
        "Audit run finished"
    );

    Ok(AuditReport {
        summary,
        complete,
        workers,
    })
}

/// Wait on the completion barrier and on the worker handles together. The
/// barrier is the normal exit; the handles end the wait when a worker dies
/// and its remaining items can never be observed.
async fn settle(
    aggregator: &Aggregator,
    total: usize,
    handles: Vec<JoinHandle<WorkerReport>>,
) -> Vec<WorkerReport> {
    let joined = join_workers(handles);
    tokio::pin!(joined);
    tokio::select! {
        workers = &mut joined => return workers,
        _ = aggregator.await_completion(total) => {}
    }
    joined.await
}
