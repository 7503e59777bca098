//! Script evaluation result shapes.
//!
//! `Runtime.evaluate` returns a remote object plus optional exception detail.
//! [`EvalOutcome`] is the distilled form consumed above the transport: the
//! by-value result and a flattened exception description, when one occurred.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value mirrored from the remote JavaScript heap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// JavaScript type tag (`string`, `number`, `object`, `undefined`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// By-value payload when the call requested one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Host-side description (used for non-serializable values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Exception detail attached to a failed evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Short exception summary from the host.
    pub text: String,
    /// The thrown value, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
    /// 0-based line in the evaluated script.
    #[serde(default)]
    pub line_number: i64,
    /// 0-based column in the evaluated script.
    #[serde(default)]
    pub column_number: i64,
}

impl ExceptionDetails {
    /// Best human-readable description of the thrown value.
    pub fn describe(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| self.text.clone())
    }
}

/// Raw `Runtime.evaluate` response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    /// Evaluation result object.
    pub result: RemoteObject,
    /// Present when the script threw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

/// Distilled evaluation outcome used at the transport seam.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalOutcome {
    /// By-value result; `Value::Null` for undefined/non-serializable results.
    pub value: Value,
    /// Flattened exception description when the script threw.
    pub exception: Option<String>,
}

impl From<EvaluateResult> for EvalOutcome {
    fn from(raw: EvaluateResult) -> Self {
        Self {
            value: raw.result.value.unwrap_or(Value::Null),
            exception: raw.exception_details.map(|d| d.describe()),
        }
    }
}

/// Distilled navigation outcome used at the transport seam.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationOutcome {
    /// Host-reported failure reason, e.g. `net::ERR_ABORTED`; `None` on
    /// success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}
