//! Trait seams toward the transport and the host-process launcher.
//!
//! The control plane depends on the debugging protocol only through
//! [`Debugger`] and on process launch only through [`Launcher`]. Concrete
//! implementations live in `pilot-runtime`; tests run against the fakes in
//! [`crate::testing`].

use std::path::PathBuf;

use async_trait::async_trait;
use pilot_protocol::{EvalOutcome, NavigationOutcome, TargetInfo};

use crate::error::Result;

/// Operations the control plane needs from the debugging protocol transport.
///
/// One implementor instance corresponds to one logical session: `connect`
/// binds it to a target, and subsequent page operations run against that
/// target until `disconnect` or the next `connect`.
#[async_trait]
pub trait Debugger: Send + Sync {
    /// Lists all live targets via the discovery endpoint.
    async fn list_targets(&self) -> Result<Vec<TargetInfo>>;

    /// Attaches to `target_id`, enabling the protocol domains the control
    /// plane relies on and normalizing the viewport.
    async fn connect(&self, target_id: &str) -> Result<()>;

    /// Releases the session. Idempotent.
    async fn disconnect(&self);

    /// Evaluates `expression` in the attached page, returning the by-value
    /// result plus exception detail.
    async fn evaluate(&self, expression: &str) -> Result<EvalOutcome>;

    /// Navigates the attached page.
    async fn navigate(&self, url: &str) -> Result<NavigationOutcome>;

    /// Closes a target. Returns false when the host refused.
    async fn close_target(&self, target_id: &str) -> Result<bool>;

    /// Opens a new tab at `url`.
    async fn create_target(&self, url: &str) -> Result<TargetInfo>;

    /// Injects local files into the file input matched by `selector`.
    async fn set_file_input(&self, selector: &str, paths: &[PathBuf]) -> Result<()>;

    /// Captures a screenshot of the attached page.
    async fn capture_screenshot(&self) -> Result<Vec<u8>>;

    /// Cheap reachability probe against the discovery endpoint, without
    /// touching the session.
    async fn endpoint_reachable(&self) -> bool;
}

/// Starts the remote application's host process.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Ensures a host process is listening on `port`. Must be a no-op when
    /// the endpoint is already reachable.
    async fn ensure_running(&self, port: u16) -> Result<()>;

    /// Launches a fresh host process with the debugging flag, used during
    /// cold-start recovery after the running instance went away.
    async fn relaunch(&self, port: u16) -> Result<()>;
}
