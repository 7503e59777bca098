//! Session message shapes for the per-target WebSocket channel.
//!
//! The channel carries a flat JSON-RPC-like protocol: requests carry an `id`
//! and a dotted `method`, responses echo the `id` with either a `result` or
//! an `error`, and events arrive without an `id`. Correlation lives in
//! `pilot-runtime`; these are only the wire shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request sent to the host process over the session channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique id used to correlate the response.
    pub id: u64,
    /// Dotted protocol method, e.g. `Runtime.evaluate`.
    pub method: String,
    /// Method parameters; omitted when empty.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// Response to a previously issued [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request id this response correlates to.
    pub id: u64,
    /// Success result, mutually exclusive with `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload, mutually exclusive with `result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// Error detail attached to a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Protocol error code.
    #[serde(default)]
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Extra detail string, when the host provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Unsolicited event emitted by the host process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Dotted event method, e.g. `Page.frameNavigated`.
    pub method: String,
    /// Event parameters.
    #[serde(default)]
    pub params: Value,
}

/// Discriminated union of inbound session messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Response message (has an `id` field).
    Response(Response),
    /// Event message (no `id` field).
    Event(Event),
    /// Forward-compatible catch-all for unknown shapes.
    Unknown(Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_without_null_params() {
        let request = Request {
            id: 3,
            method: "Runtime.enable".to_string(),
            params: Value::Null,
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire, json!({"id": 3, "method": "Runtime.enable"}));
    }

    #[test]
    fn response_with_result_parses() {
        let json = r#"{"id": 7, "result": {"result": {"type": "number", "value": 2}}}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        match message {
            Message::Response(response) => {
                assert_eq!(response.id, 7);
                assert!(response.result.is_some());
                assert!(response.error.is_none());
            }
            _ => panic!("expected Response"),
        }
    }

    #[test]
    fn response_with_error_parses() {
        let json = r#"{"id": 9, "error": {"code": -32000, "message": "Target closed"}}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        match message {
            Message::Response(response) => {
                let error = response.error.unwrap();
                assert_eq!(error.code, -32000);
                assert_eq!(error.message, "Target closed");
            }
            _ => panic!("expected Response"),
        }
    }

    #[test]
    fn event_without_id_parses_as_event() {
        let json = r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.0}}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        match message {
            Message::Event(event) => assert_eq!(event.method, "Page.loadEventFired"),
            _ => panic!("expected Event"),
        }
    }
}
