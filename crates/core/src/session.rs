//! Session lifecycle and the retry wrapper.
//!
//! [`Session`] owns the one logical control session bound to a target tab:
//! connection state, the cached health probe, the reconnecting flag, and the
//! transient-failure attempt counter. Operations against the remote target
//! go through [`Session::with_retry`], which layers cooperative waiting,
//! cached health checks, signature-based error classification, bounded
//! exponential backoff, and cold-start recovery on top of the bare call.
//!
//! All of this state is per-instance: a process driving several sessions
//! creates several `Session` values rather than sharing one.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use pilot_protocol::TargetInfo;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::debugger::{Debugger, Launcher};
use crate::error::{Error, Result};

/// Connection state owned exclusively by the session.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ConnectionState {
    /// Whether a session is currently attached.
    pub connected: bool,
    /// Remote debugging port in use.
    pub port: u16,
    /// URL of the attached tab at connect/navigate time.
    pub url: Option<String>,
    /// Target id the session is bound to.
    pub active_target_id: Option<String>,
}

#[derive(Debug, Default)]
struct HealthCache {
    healthy: bool,
    checked_at: Option<Instant>,
}

/// One logical control session against the host process.
pub struct Session<D, L, C> {
    debugger: D,
    launcher: L,
    clock: C,
    config: Config,
    state: Mutex<ConnectionState>,
    health: Mutex<HealthCache>,
    reconnecting: AtomicBool,
    attempts: AtomicU32,
}

impl<D: Debugger, L: Launcher, C: Clock> Session<D, L, C> {
    pub fn new(debugger: D, launcher: L, clock: C, config: Config) -> Self {
        let port = config.port;
        Self {
            debugger,
            launcher,
            clock,
            config,
            state: Mutex::new(ConnectionState {
                port,
                ..ConnectionState::default()
            }),
            health: Mutex::new(HealthCache::default()),
            reconnecting: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    /// Direct access to the transport, for operations composed by callers.
    pub fn debugger(&self) -> &D {
        &self.debugger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Snapshot of the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    pub(crate) fn record_url(&self, url: &str) {
        self.state.lock().url = Some(url.to_string());
    }

    /// Establishes a session to `target_id`, or to the best available target
    /// when none is given.
    pub async fn connect(&self, target_id: Option<&str>) -> Result<()> {
        let targets = self.debugger.list_targets().await?;
        let chosen = match target_id {
            Some(id) => targets
                .iter()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::TargetNotFound(id.to_string()))?,
            None => self
                .select_target(&targets, None)
                .ok_or_else(|| Error::NoTarget("no page target in listing".to_string()))?,
        };

        self.debugger.connect(&chosen.id).await?;
        {
            let mut state = self.state.lock();
            state.connected = true;
            state.url = Some(chosen.url.clone());
            state.active_target_id = Some(chosen.id.clone());
        }
        self.invalidate_health();
        debug!(target = "pilot.session", id = %chosen.id, url = %chosen.url, "attached");
        Ok(())
    }

    /// Releases the session. Idempotent.
    pub async fn disconnect(&self) {
        self.debugger.disconnect().await;
        let mut state = self.state.lock();
        state.connected = false;
        state.active_target_id = None;
    }

    /// Cheap health probe, cached for [`Config::health_ttl`].
    ///
    /// Calls inside the window return the cached result without touching the
    /// remote. A failed probe is reported as unhealthy, not an error.
    pub async fn health_check(&self) -> bool {
        {
            let health = self.health.lock();
            if let Some(at) = health.checked_at {
                if self.clock.now().duration_since(at) < self.config.health_ttl {
                    return health.healthy;
                }
            }
        }

        let healthy = match self.debugger.evaluate("1 + 1").await {
            Ok(outcome) => outcome.exception.is_none() && outcome.value == serde_json::json!(2),
            Err(err) => {
                debug!(target = "pilot.session", error = %err, "health probe failed");
                false
            }
        };

        let mut health = self.health.lock();
        health.healthy = healthy;
        health.checked_at = Some(self.clock.now());
        healthy
    }

    /// Drops the cached health result so the next check probes the remote.
    pub fn invalidate_health(&self) {
        let mut health = self.health.lock();
        health.checked_at = None;
        health.healthy = false;
    }

    /// Re-establishes a usable session.
    ///
    /// Verifies the host process is reachable (starting it when not),
    /// prefers the previously active target if still present, then falls
    /// back to a primary-application tab, then to any non-blank page tab.
    pub async fn reconnect(&self) -> Result<()> {
        self.reconnecting.store(true, Ordering::SeqCst);
        let result = self.reconnect_inner().await;
        self.reconnecting.store(false, Ordering::SeqCst);
        result
    }

    async fn reconnect_inner(&self) -> Result<()> {
        if !self.debugger.endpoint_reachable().await {
            warn!(target = "pilot.session", port = self.config.port, "host unreachable; launching");
            self.launcher.ensure_running(self.config.port).await?;
        }

        let previous = self.state.lock().active_target_id.clone();
        let targets = self.debugger.list_targets().await?;
        let chosen = self
            .select_target(&targets, previous.as_deref())
            .ok_or_else(|| Error::NoTarget("no usable page target after reconnect".to_string()))?
            .clone();

        self.debugger.connect(&chosen.id).await?;
        {
            let mut state = self.state.lock();
            state.connected = true;
            state.url = Some(chosen.url.clone());
            state.active_target_id = Some(chosen.id.clone());
        }
        self.invalidate_health();
        debug!(target = "pilot.session", id = %chosen.id, "reconnected");
        Ok(())
    }

    /// Target selection priority: previous target if still listed, then a
    /// page matching the primary application's URL patterns, then any
    /// non-blank page.
    fn select_target<'t>(
        &self,
        targets: &'t [TargetInfo],
        previous: Option<&str>,
    ) -> Option<&'t TargetInfo> {
        if let Some(prev) = previous {
            if let Some(target) = targets.iter().find(|t| t.id == prev) {
                return Some(target);
            }
        }
        if let Some(target) = targets
            .iter()
            .find(|t| t.is_page() && self.config.matches_primary(&t.url))
        {
            return Some(target);
        }
        targets.iter().find(|t| t.is_page() && !t.is_blank())
    }

    /// Bounded cooperative wait while another caller's reconnect runs.
    ///
    /// Returns false when the wait budget elapsed with the flag still set.
    async fn wait_for_reconnect(&self) -> bool {
        for _ in 0..self.config.reconnect_wait_attempts {
            if !self.reconnecting.load(Ordering::SeqCst) {
                return true;
            }
            self.clock.sleep(self.config.reconnect_wait_interval).await;
        }
        !self.reconnecting.load(Ordering::SeqCst)
    }

    /// Runs `op` with automatic recovery from transient connection failures.
    ///
    /// Non-transient errors propagate immediately, untouched. A transient
    /// failure under the attempt budget invalidates the health cache, backs
    /// off, reconnects, and retries the operation exactly once; if the retry
    /// also fails transiently, one cold-start recovery (host relaunch plus
    /// target reselection) runs before the error surfaces. Any successful
    /// execution resets the attempt counter.
    pub async fn with_retry<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.reconnecting.load(Ordering::SeqCst) {
            debug!(target = "pilot.session", what, "waiting for in-flight reconnect");
            self.wait_for_reconnect().await;
        }

        if !self.health_check().await {
            if let Err(err) = self.reconnect().await {
                warn!(target = "pilot.session", what, error = %err, "pre-op reconnect failed");
            }
        }

        let first = match op().await {
            Ok(value) => {
                self.attempts.store(0, Ordering::SeqCst);
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => err,
        };

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.config.attempt_budget {
            warn!(target = "pilot.session", what, attempt, "attempt budget exhausted");
            return Err(first);
        }

        debug!(
            target = "pilot.session",
            what,
            attempt,
            error = %first,
            "transient failure; recovering"
        );
        self.invalidate_health();
        self.clock.sleep(self.config.backoff_delay(attempt)).await;
        if let Err(err) = self.reconnect().await {
            warn!(target = "pilot.session", what, error = %err, "reconnect failed");
        }

        let second = match op().await {
            Ok(value) => {
                self.attempts.store(0, Ordering::SeqCst);
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => err,
        };

        // Last resort: assume the host process itself is gone.
        warn!(
            target = "pilot.session",
            what,
            error = %second,
            "retry failed; attempting cold-start recovery"
        );
        self.launcher.relaunch(self.config.port).await?;
        self.reconnect().await?;

        match op().await {
            Ok(value) => {
                self.attempts.store(0, Ordering::SeqCst);
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAction, FakeDebugger, FakeLauncher, ManualClock};
    use pilot_protocol::TargetKind;
    use std::time::Duration;

    fn target(id: &str, url: &str) -> TargetInfo {
        TargetInfo {
            id: id.to_string(),
            kind: TargetKind::Page,
            url: url.to_string(),
            title: String::new(),
            web_socket_debugger_url: None,
        }
    }

    fn config() -> Config {
        Config {
            primary_url_patterns: vec!["app.example".into()],
            ..Config::default()
        }
    }

    fn session() -> Session<FakeDebugger, FakeLauncher, ManualClock> {
        let debugger = FakeDebugger::new();
        debugger.set_targets(vec![
            target("A", "https://app.example/chat"),
            target("B", "https://shop.example/item"),
        ]);
        Session::new(debugger, FakeLauncher::new(), ManualClock::new(), config())
    }

    #[tokio::test]
    async fn connect_records_state() {
        let session = session();
        session.connect(Some("A")).await.unwrap();

        let state = session.state();
        assert!(state.connected);
        assert_eq!(state.active_target_id.as_deref(), Some("A"));
        assert_eq!(state.url.as_deref(), Some("https://app.example/chat"));
    }

    #[tokio::test]
    async fn connect_unknown_target_fails() {
        let session = session();
        let err = session.connect(Some("missing")).await.unwrap_err();
        assert!(matches!(err, Error::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn connect_without_id_prefers_primary() {
        let session = session();
        session.connect(None).await.unwrap();
        assert_eq!(session.state().active_target_id.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn health_check_caches_within_ttl() {
        let session = session();
        assert!(session.health_check().await);
        assert!(session.health_check().await);
        assert_eq!(session.debugger().probe_count(), 1);

        // Step past the TTL; the next check must probe again.
        session.clock().advance(Duration::from_millis(2100));
        assert!(session.health_check().await);
        assert_eq!(session.debugger().probe_count(), 2);
    }

    #[tokio::test]
    async fn non_transient_error_propagates_without_reconnect() {
        let session = session();
        session.connect(Some("A")).await.unwrap();
        session.debugger().clear_actions();

        let err = session
            .with_retry("op", || async {
                Err::<(), _>(Error::InputNotFound("no textbox".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InputNotFound(_)));
        let actions = session.debugger().actions();
        assert!(
            !actions.iter().any(|a| matches!(a, FakeAction::Connect(_))),
            "no reconnect expected, got {actions:?}"
        );
    }

    #[tokio::test]
    async fn transient_error_retries_and_resets_counter() {
        let session = session();
        session.connect(Some("A")).await.unwrap();

        let calls = std::sync::atomic::AtomicU32::new(0);
        let value = session
            .with_retry("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Error::Connection("websocket connection closed".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.attempts.load(Ordering::SeqCst), 0);
        // Backoff slept before the retry.
        assert!(
            session
                .clock()
                .sleeps()
                .contains(&Duration::from_millis(300))
        );
    }

    #[tokio::test]
    async fn second_failure_triggers_cold_start() {
        let session = session();
        session.connect(Some("A")).await.unwrap();

        let calls = std::sync::atomic::AtomicU32::new(0);
        let value = session
            .with_retry("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::Connection("connection reset".into()))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.launcher.relaunches(), 1);
    }

    #[tokio::test]
    async fn reconnect_prefers_previous_then_primary() {
        let session = session();
        session.connect(Some("B")).await.unwrap();
        session.reconnect().await.unwrap();
        assert_eq!(session.state().active_target_id.as_deref(), Some("B"));

        // Previous target gone: falls back to the primary-app tab.
        session
            .debugger()
            .set_targets(vec![target("A", "https://app.example/chat")]);
        session.reconnect().await.unwrap();
        assert_eq!(session.state().active_target_id.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn reconnect_launches_when_unreachable() {
        let session = session();
        session.debugger().set_reachable(false);
        session.reconnect().await.unwrap();
        assert_eq!(session.launcher.ensure_calls(), 1);
    }

    #[tokio::test]
    async fn reconnect_with_empty_listing_fails() {
        let session = session();
        session.debugger().set_targets(vec![]);
        let err = session.reconnect().await.unwrap_err();
        assert!(matches!(err, Error::NoTarget(_)));
    }

    #[tokio::test]
    async fn attempt_budget_exhaustion_surfaces_error() {
        let config = Config {
            attempt_budget: 0,
            ..config()
        };
        let debugger = FakeDebugger::new();
        debugger.set_targets(vec![target("A", "https://app.example/chat")]);
        let session = Session::new(debugger, FakeLauncher::new(), ManualClock::new(), config);

        let err = session
            .with_retry("op", || async {
                Err::<(), _>(Error::Connection("connection reset".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(session.launcher.relaunches(), 0);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let session = session();
        session.connect(Some("A")).await.unwrap();
        session.disconnect().await;
        session.disconnect().await;
        assert!(!session.state().connected);
    }
}
