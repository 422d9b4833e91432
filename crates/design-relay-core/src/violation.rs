//! Schema violation error shared by every boundary validator.

use thiserror::Error;

/// A payload crossing the relay boundary did not match the protocol.
///
/// `path` names the offending field in dotted/indexed form
/// (`messages[1].content`, `context.design.image_url`); `$` is the
/// payload root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation at `{path}`: {reason}")]
pub struct SchemaViolation {
    /// Location of the violating field.
    pub path: String,
    /// Human-readable cause.
    pub reason: String,
}

impl SchemaViolation {
    /// Create a violation at the given path.
    #[must_use]
    pub fn at(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Re-root this violation under `prefix`.
    #[must_use]
    pub fn within(mut self, prefix: &str) -> Self {
        self.path = if self.path == "$" {
            prefix.to_string()
        } else if self.path.starts_with('[') {
            format!("{prefix}{}", self.path)
        } else {
            format!("{prefix}.{}", self.path)
        };
        self
    }

    pub(crate) fn from_serde(path: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::at(path, err.to_string())
    }
}
