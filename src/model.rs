//! Work items and probe outcomes.
//!
//! A `WorkItem` is one row selected from the content index. Probing it
//! produces an `Outcome`, which is the only thing workers hand to the
//! aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored CID selected for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub cid: String,
    /// Storage location handle the content lives on.
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(cid: impl Into<String>, location: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            cid: cid.into(),
            location: location.into(),
            created_at,
        }
    }
}

/// Classified result of probing one CID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Gateway answered 200.
    Available,
    /// Gateway answered with any other status code.
    Unavailable { code: u16 },
    /// No HTTP response at all (timeout, refused, DNS, ...).
    Unreachable { reason: String },
}

impl ProbeStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            ProbeStatus::Available => StatusKind::Available,
            ProbeStatus::Unavailable { .. } => StatusKind::Unavailable,
            ProbeStatus::Unreachable { .. } => StatusKind::Unreachable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ProbeStatus::Available)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Available => write!(f, "available"),
            ProbeStatus::Unavailable { code } => write!(f, "unavailable ({})", code),
            ProbeStatus::Unreachable { reason } => write!(f, "unreachable ({})", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Available,
    Unavailable,
    Unreachable,
}

/// One probed item, as reported by the worker that probed it.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub item: WorkItem,
    pub status: ProbeStatus,
    pub worker_id: usize,
    pub latency_ms: u64,
}
