//! Partitioner — splits the work list into one contiguous share per worker.
//!
//! Shares are as even as possible. When the item count does not divide by
//! the worker count, the first `len % workers` shares carry one extra item,
//! so concatenating the shares in order always gives back the input.

use crate::config::ConfigError;
use crate::model::WorkItem;

/// The contiguous run of items owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share<T = WorkItem> {
    /// 1-based worker id.
    pub worker_id: usize,
    pub items: Vec<T>,
}

impl<T> Share<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split `items` into exactly `worker_count` shares.
pub fn partition<T>(items: Vec<T>, worker_count: usize) -> Result<Vec<Share<T>>, ConfigError> {
    if worker_count == 0 {
        return Err(ConfigError::InvalidWorkerCount(0));
    }

    let base = items.len() / worker_count;
    let extra = items.len() % worker_count;
    let mut remaining = items.into_iter();

    let shares = (0..worker_count)
        .map(|idx| {
            let len = base + usize::from(idx < extra);
            Share {
                worker_id: idx + 1,
                items: remaining.by_ref().take(len).collect(),
            }
        })
        .collect();

    Ok(shares)
}
