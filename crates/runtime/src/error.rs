//! Error types for the transport runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the transport runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to reach the discovery endpoint.
    #[error("discovery request failed: {0}")]
    Discovery(String),

    /// Failed to establish the WebSocket session.
    #[error("failed to connect session: {0}")]
    ConnectionFailed(String),

    /// WebSocket-level failure on an established session.
    #[error("transport error: {0}")]
    Transport(String),

    /// The host rejected a protocol call.
    #[error("protocol error ({code}): {message}")]
    Remote {
        /// Protocol error code.
        code: i64,
        /// Host-provided message.
        message: String,
    },

    /// No session is attached.
    #[error("session closed")]
    SessionClosed,

    /// The session channel shut down while a call was pending.
    #[error("channel closed unexpectedly")]
    ChannelClosed,

    /// A protocol call exceeded its deadline.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The host process binary could not be located or started.
    #[error("launch failed: {0}")]
    Launch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<Error> for pilot::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Launch(msg) => pilot::Error::Launch(msg),
            other => pilot::Error::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_transient_connection_errors() {
        let core: pilot::Error = Error::SessionClosed.into();
        assert!(core.is_transient());

        let core: pilot::Error = Error::ChannelClosed.into();
        assert!(core.is_transient());

        let core: pilot::Error = Error::Timeout("Runtime.evaluate".into()).into();
        assert!(core.is_transient());
    }

    #[test]
    fn launch_errors_stay_launch_errors() {
        let core: pilot::Error = Error::Launch("binary not found".into()).into();
        assert!(matches!(core, pilot::Error::Launch(_)));
        assert!(!core.is_transient());
    }
}
