//! HTTP gateway probe: `GET <scheme>://<host>/gw/ipfs/<cid>`.

use async_trait::async_trait;
use std::time::Duration;

use super::{ClientError, Probe, ProbeError};

pub struct GatewayProbe {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayProbe {
    /// Build a probe against `host`. `timeout` bounds each whole request.
    pub fn new(scheme: &str, host: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cid-audit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, format!("{}://{}", scheme, host)))
    }

    /// Reuse an existing client; `base_url` has no trailing path.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn url_for(&self, cid: &str) -> String {
        format!("{}/gw/ipfs/{}", self.base_url, cid)
    }
}

#[async_trait]
impl Probe for GatewayProbe {
    async fn probe(&self, cid: &str) -> Result<u16, ProbeError> {
        // Only the status line matters; the body is dropped unread.
        let resp = self.client.get(self.url_for(cid)).send().await?;
        Ok(resp.status().as_u16())
    }
}
