//! Wire details shared by the HTTP endpoint and the client adapter.

use serde::{Deserialize, Serialize};

/// Path of the turn endpoint.
pub const AGENT_PATH: &str = "/api/agent";

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Body returned with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind: `schema_violation` or `agent_error`.
    pub error: String,
    pub message: String,
    /// Violating field, for schema violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorBody {
    /// Body for a rejected request.
    #[must_use]
    pub fn schema_violation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: "schema_violation".to_string(),
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Generic body for any downstream failure.
    #[must_use]
    pub fn agent_error() -> Self {
        Self {
            error: "agent_error".to_string(),
            message: "Agent error".to_string(),
            path: None,
        }
    }
}
