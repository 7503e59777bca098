//! Concrete [`Debugger`] over the discovery surface and per-target sessions.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pilot::debugger::Debugger;
use pilot_protocol::{EvalOutcome, EvaluateResult, NavigationOutcome, TargetInfo};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::CdpSession;
use crate::discovery::Discovery;
use crate::error::{Error, Result};

/// Viewport applied to every attached target, so element geometry used by
/// the submission heuristics is predictable.
const VIEWPORT: (u32, u32) = (1440, 900);

/// Debugging-protocol client bound to one port.
///
/// `connect` binds the client to a target; page operations run against that
/// target until the next connect or disconnect.
pub struct CdpClient {
    discovery: Discovery,
    session: Mutex<Option<CdpSession>>,
}

impl CdpClient {
    pub fn new(port: u16) -> Self {
        Self {
            discovery: Discovery::new(port),
            session: Mutex::new(None),
        }
    }

    /// Issues one protocol call against the attached session.
    async fn session_call(&self, method: &str, params: Value) -> Result<Value> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(Error::SessionClosed)?;
        session.call(method, params).await
    }
}

#[async_trait]
impl Debugger for CdpClient {
    async fn list_targets(&self) -> pilot::Result<Vec<TargetInfo>> {
        self.discovery.list().await.map_err(pilot::Error::from)
    }

    async fn connect(&self, target_id: &str) -> pilot::Result<()> {
        let targets = self.discovery.list().await.map_err(pilot::Error::from)?;
        let target = targets
            .iter()
            .find(|t| t.id == target_id)
            .ok_or_else(|| pilot::Error::TargetNotFound(target_id.to_string()))?;

        let session = CdpSession::connect(&self.discovery.ws_url(target))
            .await
            .map_err(pilot::Error::from)?;
        *self.session.lock().await = Some(session);

        // Enable the domains the control plane relies on and pin the
        // viewport before handing the session out.
        for method in ["Runtime.enable", "Page.enable", "DOM.enable"] {
            self.session_call(method, json!({}))
                .await
                .map_err(pilot::Error::from)?;
        }
        self.session_call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": VIEWPORT.0,
                "height": VIEWPORT.1,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await
        .map_err(pilot::Error::from)?;

        debug!(target = "pilot.transport", id = %target_id, "attached");
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.close();
        }
    }

    async fn evaluate(&self, expression: &str) -> pilot::Result<EvalOutcome> {
        let raw = self
            .session_call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await
            .map_err(pilot::Error::from)?;
        let result: EvaluateResult =
            serde_json::from_value(raw).map_err(|e| pilot::Error::from(Error::Json(e)))?;
        Ok(EvalOutcome::from(result))
    }

    async fn navigate(&self, url: &str) -> pilot::Result<NavigationOutcome> {
        let raw = self
            .session_call("Page.navigate", json!({"url": url}))
            .await
            .map_err(pilot::Error::from)?;
        serde_json::from_value(raw).map_err(|e| pilot::Error::from(Error::Json(e)))
    }

    async fn close_target(&self, target_id: &str) -> pilot::Result<bool> {
        self.discovery
            .close(target_id)
            .await
            .map_err(pilot::Error::from)
    }

    async fn create_target(&self, url: &str) -> pilot::Result<TargetInfo> {
        self.discovery.create(url).await.map_err(pilot::Error::from)
    }

    async fn set_file_input(&self, selector: &str, paths: &[PathBuf]) -> pilot::Result<()> {
        let files: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let document = self
            .session_call("DOM.getDocument", json!({}))
            .await
            .map_err(pilot::Error::from)?;
        let root = document["root"]["nodeId"].clone();

        let node = self
            .session_call(
                "DOM.querySelector",
                json!({"nodeId": root, "selector": selector}),
            )
            .await
            .map_err(pilot::Error::from)?;
        let node_id = node["nodeId"].clone();
        if node_id.as_i64().unwrap_or(0) == 0 {
            return Err(pilot::Error::InputNotFound(format!(
                "no file input matches selector '{selector}'"
            )));
        }

        self.session_call(
            "DOM.setFileInputFiles",
            json!({"nodeId": node_id, "files": files}),
        )
        .await
        .map_err(pilot::Error::from)?;
        Ok(())
    }

    async fn capture_screenshot(&self) -> pilot::Result<Vec<u8>> {
        let raw = self
            .session_call("Page.captureScreenshot", json!({"format": "png"}))
            .await
            .map_err(pilot::Error::from)?;
        let data = raw["data"].as_str().ok_or_else(|| {
            pilot::Error::from(Error::Transport("screenshot response missing data".into()))
        })?;
        BASE64
            .decode(data)
            .map_err(|e| pilot::Error::Connection(format!("invalid screenshot payload: {e}")))
    }

    async fn endpoint_reachable(&self) -> bool {
        self.discovery.reachable().await
    }
}
