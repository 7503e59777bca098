//! Target snapshots returned by the discovery endpoint.
//!
//! A target is a remote tab (or other debuggable surface) as reported by the
//! host process's `/json/list` endpoint. Each listing call produces immutable
//! snapshots; nothing here tracks liveness between calls.

use serde::{Deserialize, Serialize};

/// Kind of debuggable target reported by the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A regular tab hosting a page.
    Page,
    /// An iframe surfaced as its own target.
    Iframe,
    /// A dedicated worker.
    Worker,
    /// A service worker.
    ServiceWorker,
    /// Extension background page.
    BackgroundPage,
    /// Anything the host reports that we do not model.
    #[serde(other)]
    Other,
}

/// Immutable snapshot of one remote target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Stable identifier used for attach/close calls.
    pub id: String,
    /// Target kind as reported by the host.
    #[serde(rename = "type")]
    pub kind: TargetKind,
    /// Current URL at listing time.
    #[serde(default)]
    pub url: String,
    /// Page title at listing time.
    #[serde(default)]
    pub title: String,
    /// Per-target WebSocket debugger endpoint, absent when another client
    /// is already attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
    /// Returns true for targets that host a regular page.
    pub fn is_page(&self) -> bool {
        self.kind == TargetKind::Page
    }

    /// Returns true when the target has no meaningful content URL.
    pub fn is_blank(&self) -> bool {
        self.url.is_empty() || self.url == "about:blank"
    }
}
