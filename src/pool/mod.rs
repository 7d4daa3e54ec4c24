//! Worker pool — one task per share, probing items in share order.
//!
//! Workers never talk to each other. Each one walks its share, probes every
//! CID, hands the outcome to the aggregator, and returns a `WorkerReport`
//! through its join handle once the share is exhausted. A failed probe is
//! just another outcome; it never stops the worker.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::model::{Outcome, ProbeStatus};
use crate::partition::Share;
use crate::probe::{classify, Probe, ProbeError};

pub mod aggregator;

pub use aggregator::{Aggregator, Incomplete, RunSummary};

/// Completion signal of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub processed: usize,
    pub available: usize,
}

pub struct WorkerPool {
    probe: Arc<dyn Probe>,
    probe_timeout: Duration,
}

impl WorkerPool {
    /// `probe_timeout` bounds each probe; an expired probe counts as
    /// unreachable with reason "timeout".
    pub fn new(probe: Arc<dyn Probe>, probe_timeout: Duration) -> Self {
        Self { probe, probe_timeout }
    }

    /// Start one worker per share. Outcomes go to `aggregator` as they
    /// happen; the handles resolve once each share is done.
    pub fn spawn(
        &self,
        shares: Vec<Share>,
        aggregator: Arc<Aggregator>,
    ) -> Vec<JoinHandle<WorkerReport>> {
        shares
            .into_iter()
            .map(|share| {
                let span = info_span!("worker", id = share.worker_id);
                let probe = Arc::clone(&self.probe);
                let aggregator = Arc::clone(&aggregator);
                let timeout = self.probe_timeout;
                tokio::spawn(run_worker(share, probe, timeout, aggregator).instrument(span))
            })
            .collect()
    }
}

// ── Worker Loop ─────────────────────────────────────────────────────

async fn run_worker(
    share: Share,
    probe: Arc<dyn Probe>,
    probe_timeout: Duration,
    aggregator: Arc<Aggregator>,
) -> WorkerReport {
    let worker_id = share.worker_id;
    let mut report = WorkerReport {
        worker_id,
        processed: 0,
        available: 0,
    };
    info!(items = share.len(), "Worker started");

    for item in share.items {
        let started = Instant::now();
        let result = match tokio::time::timeout(probe_timeout, probe.probe(&item.cid)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(code) => debug!(cid = %item.cid, code, latency_ms, "Gateway responded"),
            Err(e) => warn!(cid = %item.cid, latency_ms, "Probe failed: {}", e),
        }

        let status = classify(result);
        match &status {
            ProbeStatus::Available => report.available += 1,
            ProbeStatus::Unavailable { code } => {
                warn!(cid = %item.cid, code, "CID not retrievable")
            }
            ProbeStatus::Unreachable { .. } => {}
        }

        aggregator.observe(&Outcome {
            item,
            status,
            worker_id,
            latency_ms,
        });
        report.processed += 1;
    }

    info!(
        processed = report.processed,
        available = report.available,
        "Worker finished"
    );
    report
}

/// Wait for every worker handle. A worker that panicked is logged and
/// skipped; the others' reports are still returned.
pub async fn join_workers(handles: Vec<JoinHandle<WorkerReport>>) -> Vec<WorkerReport> {
    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) if e.is_cancelled() => debug!("Worker cancelled"),
            Err(e) => error!("Worker panicked: {}", e),
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkItem;
    use crate::partition::partition;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers from a fixed table and remembers the order of calls.
    struct ScriptedProbe {
        answers: HashMap<String, Result<u16, ProbeError>>,
        delays: HashMap<String, Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        fn new() -> Self {
            Self {
                answers: HashMap::new(),
                delays: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(mut self, cid: &str, result: Result<u16, ProbeError>) -> Self {
            self.answers.insert(cid.to_string(), result);
            self
        }

        fn stall(mut self, cid: &str, delay: Duration) -> Self {
            self.delays.insert(cid.to_string(), delay);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, cid: &str) -> Result<u16, ProbeError> {
            self.calls.lock().unwrap().push(cid.to_string());
            if let Some(delay) = self.delays.get(cid) {
                tokio::time::sleep(*delay).await;
            }
            self.answers.get(cid).cloned().unwrap_or(Ok(200))
        }
    }

    fn items(cids: &[&str]) -> Vec<WorkItem> {
        cids.iter()
            .map(|c| WorkItem::new(*c, "HANDLE", Utc::now()))
            .collect()
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_share() {
        let probe = Arc::new(
            ScriptedProbe::new()
                .answer("b", Err(ProbeError::Connect("refused".into())))
                .answer("c", Ok(404)),
        );
        let pool = WorkerPool::new(probe.clone(), Duration::from_secs(5));
        let agg = Arc::new(Aggregator::new());

        let shares = partition(items(&["a", "b", "c", "d", "e"]), 1).unwrap();
        let reports = join_workers(pool.spawn(shares, Arc::clone(&agg))).await;

        assert_eq!(probe.calls(), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(reports, vec![WorkerReport { worker_id: 1, processed: 5, available: 3 }]);

        let summary = agg.await_completion(5).await;
        assert_eq!(summary.available, 3);
        assert_eq!(summary.unavailable.get(&404), Some(&1));
        assert_eq!(summary.unreachable.get("connect"), Some(&1));
    }

    #[tokio::test]
    async fn test_share_order_is_preserved_per_worker() {
        let probe = Arc::new(ScriptedProbe::new());
        let pool = WorkerPool::new(probe.clone(), Duration::from_secs(5));
        let agg = Arc::new(Aggregator::new());

        let cids: Vec<String> = (0..11).map(|i| format!("bafy-{i:02}")).collect();
        let refs: Vec<&str> = cids.iter().map(String::as_str).collect();
        let shares = partition(items(&refs), 3).unwrap();
        let reports = join_workers(pool.spawn(shares.clone(), Arc::clone(&agg))).await;
        assert_eq!(reports.len(), 3);

        let calls = probe.calls();
        for share in &shares {
            let expected: Vec<&String> = share.items.iter().map(|i| &i.cid).collect();
            let seen: Vec<&String> = calls.iter().filter(|c| expected.contains(c)).collect();
            assert_eq!(seen, expected, "worker {}", share.worker_id);
        }
        assert_eq!(agg.await_completion(11).await.completed, 11);
    }

    #[tokio::test]
    async fn test_slow_probe_becomes_timeout() {
        let probe = Arc::new(ScriptedProbe::new().stall("slow", Duration::from_secs(10)));
        let pool = WorkerPool::new(probe, Duration::from_millis(50));
        let agg = Arc::new(Aggregator::new());

        let shares = partition(items(&["slow", "fast"]), 1).unwrap();
        join_workers(pool.spawn(shares, Arc::clone(&agg))).await;

        let summary = agg.await_completion(2).await;
        assert_eq!(summary.available, 1);
        assert_eq!(summary.unreachable.get("timeout"), Some(&1));
    }

    #[tokio::test]
    async fn test_empty_shares_finish_immediately() {
        let pool = WorkerPool::new(Arc::new(ScriptedProbe::new()), Duration::from_secs(1));
        let agg = Arc::new(Aggregator::new());

        let shares = partition(Vec::new(), 5).unwrap();
        let reports = join_workers(pool.spawn(shares, agg)).await;

        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(|r| r.processed == 0));
    }
}
