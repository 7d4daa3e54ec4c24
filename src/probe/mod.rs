//! Retrieval probe trait — how a worker asks "is this CID still served?".
//!
//! A probe only reports what happened on the wire: a status code, or a
//! transport failure. Turning that into a `ProbeStatus` is `classify`'s job,
//! so every probe implementation is judged by the same rules.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::ProbeStatus;

pub mod gateway;

pub use gateway::GatewayProbe;

/// Transport-level failure: the request never produced an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Transport(String),
}

/// The HTTP client behind a probe could not be built.
#[derive(Debug, Error)]
#[error("failed to build HTTP client")]
pub struct ClientError(#[from] reqwest::Error);

impl ProbeError {
    /// Short label used as the unreachable reason in run summaries.
    pub fn reason(&self) -> &'static str {
        match self {
            ProbeError::Timeout => "timeout",
            ProbeError::Connect(_) => "connect",
            ProbeError::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout
        } else if e.is_connect() {
            ProbeError::Connect(e.to_string())
        } else {
            ProbeError::Transport(e.to_string())
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Issue one retrieval request for `cid` and report the status code.
    async fn probe(&self, cid: &str) -> Result<u16, ProbeError>;
}

/// Map a raw probe result onto the three outcome classes.
pub fn classify(result: Result<u16, ProbeError>) -> ProbeStatus {
    match result {
        Ok(200) => ProbeStatus::Available,
        Ok(code) => ProbeStatus::Unavailable { code },
        Err(e) => ProbeStatus::Unreachable {
            reason: e.reason().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ok() {
        assert_eq!(classify(Ok(200)), ProbeStatus::Available);
    }

    #[test]
    fn test_classify_other_codes() {
        for code in [201, 204, 301, 404, 429, 500, 504] {
            assert_eq!(classify(Ok(code)), ProbeStatus::Unavailable { code });
        }
    }

    #[test]
    fn test_classify_transport_errors() {
        let cases = [
            (ProbeError::Timeout, "timeout"),
            (ProbeError::Connect("refused".into()), "connect"),
            (ProbeError::Transport("reset".into()), "transport"),
        ];
        for (err, reason) in cases {
            match classify(Err(err)) {
                ProbeStatus::Unreachable { reason: r } => {
                    assert!(!r.is_empty());
                    assert_eq!(r, reason);
                }
                other => panic!("expected unreachable, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_client_build_failure_keeps_cause() {
        let cause = reqwest::Client::builder()
            .user_agent("cid-audit\n")
            .build()
            .unwrap_err();
        let err = ClientError::from(cause);
        assert_eq!(err.to_string(), "failed to build HTTP client");
        assert!(std::error::Error::source(&err).is_some());
    }
}
