//! Error types for the control plane.

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message fragments that identify a failure as connection-related and
/// therefore eligible for automatic retry. Matched case-insensitively
/// against the rendered error.
pub const TRANSIENT_SIGNATURES: &[&str] = &[
    "websocket",
    "socket hang up",
    "connection closed",
    "connection reset",
    "connection refused",
    "session closed",
    "session not found",
    "target closed",
    "target crashed",
    "timed out",
    "timeout",
    "net::err_aborted",
    "navigation aborted",
    "detached",
    "execution context was destroyed",
    "broken pipe",
    "channel closed",
    "unexpected eof",
];

/// Errors that can occur while driving the remote application.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure while talking to the host process.
    #[error("connection error: {0}")]
    Connection(String),

    /// The requested target no longer exists in the listing.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// No target qualifies for attachment at all.
    #[error("no eligible target: {0}")]
    NoTarget(String),

    /// No prompt input surface could be located on the page.
    ///
    /// Not retried: the page needs to be navigated to the right surface
    /// before submission can work.
    #[error("no prompt input found: {0}")]
    InputNotFound(String),

    /// Submission could not be verified after exhausting every fallback.
    ///
    /// The prompt may still have been accepted; callers should poll status
    /// rather than treat this as terminal.
    #[error("submission not verified: {0}")]
    SubmissionVerification(String),

    /// Refused to close the last remaining external tab.
    #[error("refusing to close tab: only {count} external tab(s) open")]
    CloseGuard { count: usize },

    /// Page script threw during evaluation.
    #[error("evaluation failed: {0}")]
    Eval(String),

    /// Navigation was rejected by the host process.
    #[error("navigation failed: {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// The host process could not be started; carries remediation text.
    #[error("launcher failed: {0}")]
    Launch(String),

    /// An operation exceeded its deadline.
    #[error("timeout after {ms}ms waiting for {what}")]
    Timeout { ms: u64, what: String },

    /// JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true when this failure matches a known transient-connection
    /// signature and is therefore eligible for automatic retry.
    ///
    /// Non-matching errors must propagate to the caller untouched.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::TargetNotFound(_) => true,
            Error::Connection(_) | Error::Eval(_) | Error::Navigation { .. } => {
                let rendered = self.to_string().to_lowercase();
                TRANSIENT_SIGNATURES.iter().any(|s| rendered.contains(s))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_match_by_signature() {
        assert!(Error::Connection("WebSocket protocol error".into()).is_transient());
        assert!(Error::Connection("Connection reset by peer".into()).is_transient());
        assert!(Error::Connection("session closed".into()).is_transient());
        assert!(!Error::Connection("authentication rejected".into()).is_transient());
    }

    #[test]
    fn eval_errors_match_only_detached_contexts() {
        assert!(Error::Eval("Execution context was destroyed".into()).is_transient());
        assert!(!Error::Eval("TypeError: x is not a function".into()).is_transient());
    }

    #[test]
    fn navigation_abort_is_transient() {
        let err = Error::Navigation {
            url: "https://app.example/chat".into(),
            reason: "net::ERR_ABORTED".into(),
        };
        assert!(err.is_transient());

        let err = Error::Navigation {
            url: "https://app.example/chat".into(),
            reason: "net::ERR_BLOCKED_BY_CLIENT".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn timeouts_and_stale_targets_are_transient() {
        assert!(
            Error::Timeout {
                ms: 100,
                what: "probe".into()
            }
            .is_transient()
        );
        assert!(Error::TargetNotFound("A".into()).is_transient());
    }

    #[test]
    fn domain_errors_are_not_transient() {
        assert!(!Error::InputNotFound("no textbox".into()).is_transient());
        assert!(!Error::SubmissionVerification("input still populated".into()).is_transient());
        assert!(!Error::CloseGuard { count: 1 }.is_transient());
        assert!(!Error::NoTarget("empty listing".into()).is_transient());
    }
}
