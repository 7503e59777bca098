//! HTTP target discovery.
//!
//! The host process exposes a small HTTP surface next to the WebSocket
//! endpoints: `/json/list` enumerates targets, `/json/new` opens one,
//! `/json/close/{id}` closes one, and `/json/version` doubles as a cheap
//! reachability probe.

use std::time::Duration;

use pilot_protocol::TargetInfo;
use tracing::debug;

use crate::error::{Error, Result};

/// Client for the discovery surface on one debugging port.
pub struct Discovery {
    http: reqwest::Client,
    base: String,
}

impl Discovery {
    pub fn new(port: u16) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("client builder with static options");
        Self {
            http,
            base: format!("http://127.0.0.1:{port}"),
        }
    }

    /// Lists all live targets.
    pub async fn list(&self) -> Result<Vec<TargetInfo>> {
        let response = self
            .http
            .get(format!("{}/json/list", self.base))
            .send()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;
        response
            .json::<Vec<TargetInfo>>()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))
    }

    /// Opens a new tab at `url`.
    pub async fn create(&self, url: &str) -> Result<TargetInfo> {
        let response = self
            .http
            .put(format!("{}/json/new?{url}", self.base))
            .send()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;
        response
            .json::<TargetInfo>()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))
    }

    /// Closes a target. Returns false when the host refused.
    pub async fn close(&self, target_id: &str) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/json/close/{target_id}", self.base))
            .send()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;
        Ok(response.status().is_success())
    }

    /// Cheap reachability probe.
    pub async fn reachable(&self) -> bool {
        match self
            .http
            .get(format!("{}/json/version", self.base))
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(target = "pilot.transport", error = %e, "discovery unreachable");
                false
            }
        }
    }

    /// WebSocket endpoint for a target, preferring the one the listing
    /// advertised.
    pub fn ws_url(&self, target: &TargetInfo) -> String {
        target
            .web_socket_debugger_url
            .clone()
            .unwrap_or_else(|| page_ws_url(&self.base, &target.id))
    }
}

fn page_ws_url(http_base: &str, target_id: &str) -> String {
    let host = http_base.trim_start_matches("http://");
    format!("ws://{host}/devtools/page/{target_id}")
}
