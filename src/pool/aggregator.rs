//! Aggregator — the one place workers write to.
//!
//! Outcomes are folded into a `RunSummary` held in a `watch` channel:
//! `send_modify` serializes concurrent `observe` calls, and waiters wake on
//! every change to re-check the completed count.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

use crate::model::{Outcome, ProbeStatus};

/// Tally of a run, by outcome class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_items: usize,
    pub completed: usize,
    pub available: usize,
    /// Unavailable outcomes per HTTP status code.
    pub unavailable: BTreeMap<u16, usize>,
    /// Unreachable outcomes per reason.
    pub unreachable: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn record(&mut self, status: &ProbeStatus) {
        self.completed += 1;
        match status {
            ProbeStatus::Available => self.available += 1,
            ProbeStatus::Unavailable { code } => *self.unavailable.entry(*code).or_default() += 1,
            ProbeStatus::Unreachable { reason } => {
                *self.unreachable.entry(reason.clone()).or_default() += 1
            }
        }
    }

    pub fn unavailable_total(&self) -> usize {
        self.unavailable.values().sum()
    }

    pub fn unreachable_total(&self) -> usize {
        self.unreachable.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total_items
    }
}

/// The deadline passed before every item had an outcome.
#[derive(Debug, Clone)]
pub struct Incomplete {
    pub summary: RunSummary,
}

impl fmt::Display for Incomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run deadline expired with {}/{} items probed",
            self.summary.completed, self.summary.total_items
        )
    }
}

impl std::error::Error for Incomplete {}

pub struct Aggregator {
    tally: watch::Sender<RunSummary>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        let (tally, _) = watch::channel(RunSummary::default());
        Self { tally }
    }

    /// Count one outcome. Safe to call from any number of workers at once.
    pub fn observe(&self, outcome: &Outcome) {
        self.tally.send_modify(|summary| summary.record(&outcome.status));
    }

    /// Current tally without waiting.
    pub fn snapshot(&self) -> RunSummary {
        self.tally.borrow().clone()
    }

    /// Wait until `total_items` outcomes have been observed.
    ///
    /// This never returns if some item is never observed (for example its
    /// worker panicked). Callers that cannot tolerate that should use
    /// [`Aggregator::await_completion_within`].
    pub async fn await_completion(&self, total_items: usize) -> RunSummary {
        let mut rx = self.tally.subscribe();
        let mut summary = match rx.wait_for(|s| s.completed >= total_items).await {
            Ok(summary) => summary.clone(),
            // Unreachable while `self` holds the sender.
            Err(_) => self.snapshot(),
        };
        summary.total_items = total_items;
        summary
    }

    /// Like [`Aggregator::await_completion`], but gives up after `deadline`
    /// and hands back whatever was tallied so far.
    pub async fn await_completion_within(
        &self,
        total_items: usize,
        deadline: Duration,
    ) -> Result<RunSummary, Incomplete> {
        match tokio::time::timeout(deadline, self.await_completion(total_items)).await {
            Ok(summary) => Ok(summary),
            Err(_) => {
                let mut summary = self.snapshot();
                summary.total_items = total_items;
                Err(Incomplete { summary })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkItem;
    use chrono::Utc;
    use std::sync::Arc;

    fn outcome(cid: &str, status: ProbeStatus) -> Outcome {
        Outcome {
            item: WorkItem::new(cid, "HANDLE", Utc::now()),
            status,
            worker_id: 1,
            latency_ms: 0,
        }
    }

    #[test]
    fn test_summary_record_buckets() {
        let mut s = RunSummary::default();
        s.record(&ProbeStatus::Available);
        s.record(&ProbeStatus::Unavailable { code: 404 });
        s.record(&ProbeStatus::Unavailable { code: 404 });
        s.record(&ProbeStatus::Unavailable { code: 500 });
        s.record(&ProbeStatus::Unreachable { reason: "timeout".into() });

        assert_eq!(s.completed, 5);
        assert_eq!(s.available, 1);
        assert_eq!(s.unavailable.get(&404), Some(&2));
        assert_eq!(s.unavailable.get(&500), Some(&1));
        assert_eq!(s.unavailable_total(), 3);
        assert_eq!(s.unreachable_total(), 1);
    }

    #[tokio::test]
    async fn test_zero_items_completes_immediately() {
        let agg = Aggregator::new();
        let summary = agg.await_completion(0).await;
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.completed, 0);
        assert!(summary.is_complete());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_observe_loses_nothing() {
        let agg = Arc::new(Aggregator::new());
        let waiter = {
            let agg = Arc::clone(&agg);
            tokio::spawn(async move { agg.await_completion(800).await })
        };

        let mut handles = Vec::new();
        for w in 0..8 {
            let agg = Arc::clone(&agg);
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    let status = if (w + i) % 4 == 0 {
                        ProbeStatus::Unavailable { code: 404 }
                    } else {
                        ProbeStatus::Available
                    };
                    agg.observe(&outcome(&format!("bafy-{w}-{i}"), status));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let summary = waiter.await.unwrap();
        assert_eq!(summary.completed, 800);
        assert_eq!(summary.available + summary.unavailable_total(), 800);
        assert_eq!(summary.unavailable.get(&404), Some(&200));
    }

    #[tokio::test]
    async fn test_waiter_blocks_until_last_outcome() {
        let agg = Arc::new(Aggregator::new());
        agg.observe(&outcome("bafy-1", ProbeStatus::Available));

        let pending = agg.await_completion_within(2, Duration::from_millis(50)).await;
        let incomplete = pending.unwrap_err();
        assert_eq!(incomplete.summary.completed, 1);
        assert_eq!(incomplete.summary.total_items, 2);

        agg.observe(&outcome("bafy-2", ProbeStatus::Available));
        let done = agg.await_completion_within(2, Duration::from_secs(1)).await.unwrap();
        assert_eq!(done.completed, 2);
        assert_eq!(done.available, 2);
    }
}
