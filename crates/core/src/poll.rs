//! Status polling loop.
//!
//! A single-threaded cooperative cycle: each iteration sleeps the poll
//! interval, performs one structured status read through the retry wrapper,
//! and either finishes or continues. No error halts the loop — transient
//! poll failures are swallowed up to a consecutive-error budget, after which
//! one hard recovery (full reconnect and target re-acquisition) runs before
//! the loop gives up. On deadline expiry the loop returns the best-effort
//! partial status it has, never an error.

use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::debugger::{Debugger, Launcher};
use crate::detector::{AgentState, AgentStatus, CompletionDetector};
use crate::error::Result;
use crate::probe::{self, PageSignals};
use crate::session::Session;

/// What one polling step decided.
enum Step {
    /// Keep polling.
    Continue,
    /// A completion condition holds.
    Finished(AgentStatus),
    /// Recovery failed; return the best-effort status.
    GiveUp,
}

/// Drives the polling state machine for one task.
pub struct PollLoop<'a, D, L, C> {
    session: &'a Session<D, L, C>,
    detector: &'a mut CompletionDetector,
    consecutive_errors: u32,
    last_status: Option<AgentStatus>,
}

impl<'a, D, L, C> PollLoop<'a, D, L, C>
where
    D: Debugger,
    L: Launcher,
    C: Clock,
{
    pub fn new(session: &'a Session<D, L, C>, detector: &'a mut CompletionDetector) -> Self {
        Self {
            session,
            detector,
            consecutive_errors: 0,
            last_status: None,
        }
    }

    /// Polls until completion or until `timeout` elapses.
    ///
    /// On expiry the last observed status is returned as-is — a partial
    /// answer, not an error.
    pub async fn run(mut self, timeout: Duration) -> AgentStatus {
        let interval = self.session.config().poll_interval;
        let deadline = self.session.clock().now() + timeout;

        loop {
            match self.step().await {
                Step::Finished(status) => return status,
                Step::GiveUp => return self.partial(),
                Step::Continue => {}
            }

            if self.session.clock().now() >= deadline {
                debug!(target = "pilot.detector", "poll deadline reached; returning partial status");
                return self.partial();
            }
            self.session.clock().sleep(interval).await;
        }
    }

    /// One iteration: read signals, classify, decide.
    async fn step(&mut self) -> Step {
        match self.read_signals().await {
            Ok(signals) => {
                self.consecutive_errors = 0;
                let status = self.detector.observe(&signals);
                let done = status.state == AgentState::Completed;
                self.last_status = Some(status.clone());
                if done {
                    Step::Finished(status)
                } else {
                    Step::Continue
                }
            }
            Err(err) => {
                self.consecutive_errors += 1;
                warn!(
                    target = "pilot.detector",
                    errors = self.consecutive_errors,
                    error = %err,
                    "status read failed"
                );
                if self.consecutive_errors <= self.session.config().poll_error_budget {
                    return Step::Continue;
                }
                // Budget blown: one hard recovery, then surrender.
                self.consecutive_errors = 0;
                match self.session.reconnect().await {
                    Ok(()) => Step::Continue,
                    Err(err) => {
                        warn!(target = "pilot.detector", error = %err, "hard recovery failed");
                        Step::GiveUp
                    }
                }
            }
        }
    }

    async fn read_signals(&self) -> Result<PageSignals> {
        let js = probe::status_probe_js();
        let outcome = self
            .session
            .with_retry("status.read", || self.session.debugger().evaluate(&js))
            .await?;
        probe::parse_signals(&outcome)
    }

    fn partial(&self) -> AgentStatus {
        self.last_status.clone().unwrap_or(AgentStatus {
            state: AgentState::Idle,
            steps: Vec::new(),
            current_step: None,
            response: None,
            stop_visible: false,
            stable: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use crate::testing::{FakeDebugger, FakeLauncher, ManualClock};
    use serde_json::json;

    fn session() -> Session<FakeDebugger, FakeLauncher, ManualClock> {
        Session::new(
            FakeDebugger::new(),
            FakeLauncher::new(),
            ManualClock::new(),
            Config::default(),
        )
    }

    fn working_payload() -> serde_json::Value {
        json!({"stopControl": true, "tailText": "working"})
    }

    fn completed_payload() -> serde_json::Value {
        json!({
            "stopControl": false,
            "followUp": true,
            "tailText": "7 steps completed. The answer is that the quick brown fox jumps over the lazy dog twice."
        })
    }

    #[tokio::test]
    async fn finishes_when_completion_condition_holds() {
        let session = session();
        session.debugger().push_eval_payload(working_payload());
        session.debugger().push_eval_payload(working_payload());
        session.debugger().push_eval_payload(completed_payload());

        let mut detector = CompletionDetector::new(Config::default());
        let status = PollLoop::new(&session, &mut detector)
            .run(Duration::from_secs(600))
            .await;

        assert_eq!(status.state, AgentState::Completed);
        assert!(status.response.unwrap().starts_with("The answer"));
    }

    #[tokio::test]
    async fn deadline_returns_partial_status() {
        let session = session();
        for _ in 0..8 {
            session.debugger().push_eval_payload(working_payload());
        }

        let mut detector = CompletionDetector::new(Config::default());
        let status = PollLoop::new(&session, &mut detector)
            .run(Duration::from_secs(6))
            .await;

        assert_eq!(status.state, AgentState::Working);
        assert!(status.stop_visible);
        assert!(status.response.is_none());
    }

    #[tokio::test]
    async fn transient_read_failures_are_swallowed() {
        let session = session();
        let debugger = session.debugger();
        // Two non-transient failures surface straight to the loop, then a
        // successful read completes the task.
        debugger.push_eval_error(Error::Eval("TypeError: boom".into()));
        debugger.push_eval_error(Error::Eval("TypeError: boom".into()));
        debugger.push_eval_payload(completed_payload());

        let mut detector = CompletionDetector::new(Config::default());
        let status = PollLoop::new(&session, &mut detector)
            .run(Duration::from_secs(600))
            .await;
        assert_eq!(status.state, AgentState::Completed);
    }

    #[tokio::test]
    async fn hard_recovery_after_error_budget() {
        let config = Config {
            poll_error_budget: 1,
            ..Config::default()
        };
        let debugger = FakeDebugger::new();
        debugger.set_targets(vec![]);
        // Non-transient read failures so the retry wrapper surfaces them
        // directly to the loop.
        for _ in 0..3 {
            debugger.push_eval_error(Error::Eval("TypeError: boom".into()));
        }
        let session = Session::new(debugger, FakeLauncher::new(), ManualClock::new(), config.clone());

        let mut detector = CompletionDetector::new(config);
        let status = PollLoop::new(&session, &mut detector)
            .run(Duration::from_secs(600))
            .await;

        // Recovery fails (empty listing) and the loop surrenders with a
        // best-effort idle status instead of raising.
        assert_eq!(status.state, AgentState::Idle);
    }
}
