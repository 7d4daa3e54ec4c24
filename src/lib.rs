//! CID audit — checks that stored CIDs are still served by a shuttle's
//! IPFS gateway.
//!
//! A run selects contents from the content index by shuttle and creation
//! date, splits them into one contiguous share per worker, probes every CID
//! over HTTP, and tallies the outcomes:
//!
//! - `source`: content index query
//! - `partition`: share split
//! - `pool`: workers and the aggregator
//! - `probe`: gateway requests and outcome classification
//! - `audit`: ties the above together for one run

pub mod audit;
pub mod config;
pub mod model;
pub mod partition;
pub mod pool;
pub mod probe;
pub mod report;
pub mod source;

pub use audit::{execute, run_audit, AuditError, AuditReport};
pub use config::{AuditConfig, ConfigError};
pub use model::{Outcome, ProbeStatus, StatusKind, WorkItem};
pub use partition::{partition, Share};
pub use pool::{Aggregator, RunSummary, WorkerPool, WorkerReport};
pub use probe::{classify, ClientError, GatewayProbe, Probe, ProbeError};
pub use source::{ContentIndex, SourceError, SourceQuery, WorkSource};
