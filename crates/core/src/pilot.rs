//! Top-level facade composing the session, registry, and detector.
//!
//! One [`Pilot`] is one logical control session plus the per-session state
//! around it. Orchestrators (the CLI, or an embedding program) call these
//! methods sequentially; nothing here is meant to be invoked concurrently
//! against the same instance.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::Config;
use crate::debugger::{Debugger, Launcher};
use crate::detector::{AgentStatus, CompletionDetector};
use crate::error::{Error, Result};
use crate::poll::PollLoop;
use crate::probe;
use crate::registry::{TabContext, TabPurpose, TabRegistry};
use crate::rules::STOP_CONTROL_LABELS;
use crate::session::{ConnectionState, Session};
use crate::submit;

/// Control plane for one remote application session.
pub struct Pilot<D, L, C> {
    session: Session<D, L, C>,
    registry: TabRegistry,
    detector: CompletionDetector,
}

impl<D: Debugger, L: Launcher, C: Clock> Pilot<D, L, C> {
    pub fn new(debugger: D, launcher: L, clock: C, config: Config) -> Self {
        let detector = CompletionDetector::new(config.clone());
        Self {
            session: Session::new(debugger, launcher, clock, config),
            registry: TabRegistry::new(),
            detector,
        }
    }

    /// The underlying session, for callers composing their own operations.
    pub fn session(&self) -> &Session<D, L, C> {
        &self.session
    }

    /// Snapshot of connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Attaches to the given target, or the best available one.
    pub async fn connect(&mut self, target_id: Option<&str>) -> Result<()> {
        self.session.connect(target_id).await?;
        self.refresh_tabs().await?;
        Ok(())
    }

    /// Releases the session. Idempotent.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Submits a prompt and polls until the task completes or `timeout`
    /// elapses, returning the final (possibly partial) status.
    pub async fn ask(&mut self, prompt: &str, timeout: Duration) -> Result<AgentStatus> {
        info!(target = "pilot", chars = prompt.len(), "submitting prompt");
        submit::submit_prompt(&self.session, prompt).await?;
        self.detector.begin_task();
        Ok(PollLoop::new(&self.session, &mut self.detector)
            .run(timeout)
            .await)
    }

    /// Performs one status read without submitting anything.
    pub async fn status(&mut self) -> Result<AgentStatus> {
        let js = probe::status_probe_js();
        let outcome = self
            .session
            .with_retry("status.read", || self.session.debugger().evaluate(&js))
            .await?;
        let signals = probe::parse_signals(&outcome)?;
        Ok(self.detector.observe(&signals))
    }

    /// Polls an already-running task until completion or `timeout`.
    pub async fn wait(&mut self, timeout: Duration) -> AgentStatus {
        PollLoop::new(&self.session, &mut self.detector)
            .run(timeout)
            .await
    }

    /// Cooperative cancellation: triggers the remote stop affordance.
    ///
    /// Returns whether a stop control was found. The connection stays up
    /// either way.
    pub async fn stop(&self) -> Result<bool> {
        let js = stop_control_js();
        let outcome = self
            .session
            .with_retry("stop", || self.session.debugger().evaluate(&js))
            .await?;
        if let Some(exception) = outcome.exception {
            return Err(Error::Eval(exception));
        }
        let clicked = outcome
            .value
            .as_str()
            .map(|raw| raw.contains("true"))
            .unwrap_or(false);
        debug!(target = "pilot", clicked, "stop requested");
        Ok(clicked)
    }

    /// Refreshes the tab registry from a fresh target listing.
    pub async fn refresh_tabs(&mut self) -> Result<Vec<TabContext>> {
        let targets = self
            .session
            .with_retry("tabs.list", || self.session.debugger().list_targets())
            .await?;
        Ok(self
            .registry
            .refresh(&targets, self.session.config(), SystemTime::now()))
    }

    /// Read-only view of the registry (as of the last refresh).
    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    /// Annotates a tab's purpose.
    pub async fn set_tab_purpose(
        &mut self,
        id: &str,
        purpose: TabPurpose,
        task_id: Option<String>,
    ) -> Result<()> {
        self.refresh_tabs().await?;
        if self.registry.set_purpose(id, purpose, task_id) {
            Ok(())
        } else {
            Err(Error::TargetNotFound(id.to_string()))
        }
    }

    /// Opens a new tab.
    pub async fn open_tab(&mut self, url: &str) -> Result<TabContext> {
        let target = self
            .session
            .with_retry("tabs.create", || self.session.debugger().create_target(url))
            .await?;
        self.refresh_tabs().await?;
        self.registry
            .get(&target.id)
            .cloned()
            .ok_or_else(|| Error::TargetNotFound(target.id))
    }

    /// Closes an external tab, enforcing the close-safety contract: the
    /// pre-close external count must be greater than one so the system is
    /// never stranded with zero usable tabs.
    pub async fn close_tab(&mut self, id: &str) -> Result<()> {
        self.refresh_tabs().await?;

        if self.registry.get(id).is_none() {
            return Err(Error::TargetNotFound(id.to_string()));
        }
        let count = self.registry.external_count();
        if count <= 1 {
            return Err(Error::CloseGuard { count });
        }

        self.session
            .with_retry("tabs.close", || self.session.debugger().close_target(id))
            .await?;
        self.refresh_tabs().await?;
        Ok(())
    }

    /// Navigates the attached tab.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let outcome = self
            .session
            .with_retry("navigate", || self.session.debugger().navigate(url))
            .await?;
        if let Some(reason) = outcome.error_text {
            return Err(Error::Navigation {
                url: url.to_string(),
                reason,
            });
        }
        self.session.record_url(url);
        Ok(())
    }

    /// Captures a screenshot of the attached tab.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.session
            .with_retry("screenshot", || self.session.debugger().capture_screenshot())
            .await
    }

    /// Injects local files into a file input on the attached tab.
    pub async fn upload(&self, selector: &str, paths: &[PathBuf]) -> Result<()> {
        self.session
            .with_retry("upload", || {
                self.session.debugger().set_file_input(selector, paths)
            })
            .await
    }
}

fn stop_control_js() -> String {
    let labels =
        serde_json::to_string(STOP_CONTROL_LABELS).expect("static table serializes");
    format!(
        r#"(() => {{
            const labels = {labels};
            const label = el =>
                ((el.getAttribute('aria-label') || '') + ' ' +
                 (el.getAttribute('title') || '') + ' ' +
                 (el.textContent || '')).toLowerCase();
            const control = Array.from(document.querySelectorAll('button, [role="button"]'))
                .find(b => {{
                    const r = b.getBoundingClientRect();
                    return r.width > 0 && r.height > 0 && !b.disabled &&
                        labels.some(s => label(b).includes(s));
                }});
            if (!control) return JSON.stringify({{clicked: false}});
            control.click();
            return JSON.stringify({{clicked: true}});
        }})()"#
    )
}
