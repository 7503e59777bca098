//! Testing infrastructure for the control plane.
//!
//! Provides in-memory fakes for the [`Debugger`](crate::debugger::Debugger)
//! and [`Launcher`](crate::debugger::Launcher) seams plus a manually driven
//! [`Clock`](crate::clock::Clock), so session, polling, and submission logic
//! run deterministically without a host process.
//!
//! Scripted evaluation results are consumed in order via
//! [`FakeDebugger::push_eval`]; health probes (`1 + 1`) are answered out of
//! band so they never eat a scripted response.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use pilot_protocol::{EvalOutcome, NavigationOutcome, TargetInfo, TargetKind};
use serde_json::json;

use crate::clock::Clock;
use crate::debugger::{Debugger, Launcher};
use crate::error::{Error, Result};

/// Action recorded by [`FakeDebugger`] for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeAction {
    ListTargets,
    Connect(String),
    Disconnect,
    Evaluate(String),
    Navigate(String),
    CloseTarget(String),
    CreateTarget(String),
    SetFileInput(String),
    Screenshot,
}

/// In-memory [`Debugger`] with scripted responses.
#[derive(Default)]
pub struct FakeDebugger {
    targets: Mutex<Vec<TargetInfo>>,
    eval_queue: Mutex<VecDeque<Result<EvalOutcome>>>,
    navigation_error: Mutex<Option<String>>,
    connected: Mutex<Option<String>>,
    reachable: AtomicBool,
    health_ok: AtomicBool,
    probe_count: AtomicUsize,
    created: AtomicUsize,
    actions: Mutex<Vec<FakeAction>>,
}

impl FakeDebugger {
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            health_ok: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Replaces the discovery listing.
    pub fn set_targets(&self, targets: Vec<TargetInfo>) {
        *self.targets.lock() = targets;
    }

    /// Controls the discovery reachability probe.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes health probes report unhealthy.
    pub fn set_health_ok(&self, ok: bool) {
        self.health_ok.store(ok, Ordering::SeqCst);
    }

    /// Queues one scripted evaluation result.
    pub fn push_eval(&self, outcome: EvalOutcome) {
        self.eval_queue.lock().push_back(Ok(outcome));
    }

    /// Queues a scripted evaluation returning a JSON string payload, the
    /// shape every page-side helper in this crate produces.
    pub fn push_eval_payload(&self, payload: serde_json::Value) {
        self.push_eval(EvalOutcome {
            value: json!(payload.to_string()),
            exception: None,
        });
    }

    /// Queues one scripted evaluation failure.
    pub fn push_eval_error(&self, err: Error) {
        self.eval_queue.lock().push_back(Err(err));
    }

    /// Sets the error text returned by subsequent navigations.
    pub fn set_navigation_error(&self, error: Option<&str>) {
        *self.navigation_error.lock() = error.map(str::to_string);
    }

    /// Number of health probes issued.
    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    /// Target id the fake is currently attached to.
    pub fn attached(&self) -> Option<String> {
        self.connected.lock().clone()
    }

    /// All recorded actions, in order.
    pub fn actions(&self) -> Vec<FakeAction> {
        self.actions.lock().clone()
    }

    pub fn clear_actions(&self) {
        self.actions.lock().clear();
    }

    fn record(&self, action: FakeAction) {
        self.actions.lock().push(action);
    }
}

#[async_trait]
impl Debugger for FakeDebugger {
    async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        self.record(FakeAction::ListTargets);
        Ok(self.targets.lock().clone())
    }

    async fn connect(&self, target_id: &str) -> Result<()> {
        self.record(FakeAction::Connect(target_id.to_string()));
        *self.connected.lock() = Some(target_id.to_string());
        Ok(())
    }

    async fn disconnect(&self) {
        self.record(FakeAction::Disconnect);
        *self.connected.lock() = None;
    }

    async fn evaluate(&self, expression: &str) -> Result<EvalOutcome> {
        self.record(FakeAction::Evaluate(expression.to_string()));

        if expression == "1 + 1" {
            self.probe_count.fetch_add(1, Ordering::SeqCst);
            return if self.health_ok.load(Ordering::SeqCst) {
                Ok(EvalOutcome {
                    value: json!(2),
                    exception: None,
                })
            } else {
                Err(Error::Connection("websocket connection closed".into()))
            };
        }

        match self.eval_queue.lock().pop_front() {
            Some(result) => result,
            None => Ok(EvalOutcome::default()),
        }
    }

    async fn navigate(&self, url: &str) -> Result<NavigationOutcome> {
        self.record(FakeAction::Navigate(url.to_string()));
        Ok(NavigationOutcome {
            error_text: self.navigation_error.lock().clone(),
        })
    }

    async fn close_target(&self, target_id: &str) -> Result<bool> {
        self.record(FakeAction::CloseTarget(target_id.to_string()));
        let mut targets = self.targets.lock();
        let before = targets.len();
        targets.retain(|t| t.id != target_id);
        Ok(targets.len() < before)
    }

    async fn create_target(&self, url: &str) -> Result<TargetInfo> {
        self.record(FakeAction::CreateTarget(url.to_string()));
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let target = TargetInfo {
            id: format!("created-{n}"),
            kind: TargetKind::Page,
            url: url.to_string(),
            title: String::new(),
            web_socket_debugger_url: None,
        };
        self.targets.lock().push(target.clone());
        Ok(target)
    }

    async fn set_file_input(&self, selector: &str, _paths: &[PathBuf]) -> Result<()> {
        self.record(FakeAction::SetFileInput(selector.to_string()));
        Ok(())
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>> {
        self.record(FakeAction::Screenshot);
        Ok(vec![0x89, 0x50, 0x4E, 0x47])
    }

    async fn endpoint_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

/// Recording [`Launcher`] fake.
#[derive(Default)]
pub struct FakeLauncher {
    ensure_calls: AtomicU32,
    relaunch_calls: AtomicU32,
    fail: AtomicBool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent launch calls fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn ensure_calls(&self) -> u32 {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn relaunches(&self) -> u32 {
        self.relaunch_calls.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(Error::Launch(
                "host binary not found; install the application or pass --executable".into(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn ensure_running(&self, _port: u16) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }

    async fn relaunch(&self, _port: u16) -> Result<()> {
        self.relaunch_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }
}

/// Manually driven clock: `sleep` returns immediately and advances simulated
/// time, so backoff and polling run instantly and deterministically.
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances simulated time without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock() += duration;
        self.sleeps.lock().push(duration);
    }
}
