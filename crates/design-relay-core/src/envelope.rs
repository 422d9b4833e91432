//! Request and response envelopes crossing the relay boundaries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AgentMessage, SchemaViolation, SessionContext};

/// Envelope sent by the client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Raw user utterance.
    pub input: String,
    /// Client-generated conversation identifier.
    pub session_id: String,
    /// Context the client last saw, if it sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<SessionContext>,
}

impl RelayRequest {
    /// Create a request without an explicit context.
    #[must_use]
    pub fn new(input: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            session_id: session_id.into(),
            context: None,
        }
    }

    /// Attach an explicit context.
    #[must_use]
    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Strictly decode a request body.
    ///
    /// # Errors
    /// Returns a violation naming the first offending field.
    pub fn from_json(body: &[u8]) -> Result<Self, SchemaViolation> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| SchemaViolation::at("$", format!("invalid JSON: {e}")))?;
        let obj = as_object(&value)?;

        let request = Self {
            input: required_string(obj, "input")?,
            session_id: required_string(obj, "sessionId")?,
            context: match obj.get("context") {
                None | Some(Value::Null) => None,
                Some(ctx) => Some(
                    SessionContext::from_value(ctx.clone()).map_err(|v| v.within("context"))?,
                ),
            },
        };
        request.validate()?;
        Ok(request)
    }

    /// Check the request-level rules that typing alone does not capture.
    ///
    /// # Errors
    /// Returns a violation for a blank session id or an invalid context.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.session_id.trim().is_empty() {
            return Err(SchemaViolation::at("sessionId", "must not be blank"));
        }
        if let Some(ctx) = &self.context {
            ctx.validate().map_err(|v| v.within("context"))?;
        }
        Ok(())
    }
}

/// Envelope returned by the relay.
///
/// `M` is the message representation: strict [`AgentMessage`] on the relay
/// side, lenient [`crate::IncomingMessage`] on the client side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<M = AgentMessage> {
    pub session_id: String,
    /// Messages produced by this turn only.
    pub messages: Vec<M>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<SessionContext>,
}

/// Relay-side response envelope.
pub type RelayResponse = ResponseEnvelope<AgentMessage>;

/// Request forwarded to the downstream agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub input: String,
    pub session_id: String,
    pub context: SessionContext,
}

/// Validated reply from the downstream agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub messages: Vec<AgentMessage>,
    /// Authoritative next context for the session.
    pub context: SessionContext,
}

impl AgentReply {
    /// Validate a raw downstream payload.
    ///
    /// Both `messages` and `context` are required; every message must be a
    /// known variant and the context must satisfy its invariants.
    ///
    /// # Errors
    /// Returns a violation naming the first offending field.
    pub fn from_value(value: Value) -> Result<Self, SchemaViolation> {
        let Value::Object(mut obj) = value else {
            return Err(SchemaViolation::at("$", "agent reply must be an object"));
        };

        let messages = match obj.remove("messages") {
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| {
                    AgentMessage::from_value(item)
                        .map_err(|v| v.within(&format!("messages[{idx}]")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(SchemaViolation::at("messages", "must be an array")),
            None => return Err(SchemaViolation::at("messages", "missing field")),
        };

        let context = match obj.remove("context") {
            Some(ctx) => SessionContext::from_value(ctx).map_err(|v| v.within("context"))?,
            None => return Err(SchemaViolation::at("context", "missing field")),
        };

        Ok(Self { messages, context })
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, SchemaViolation> {
    value
        .as_object()
        .ok_or_else(|| SchemaViolation::at("$", "envelope must be an object"))
}

fn required_string(obj: &Map<String, Value>, key: &str) -> Result<String, SchemaViolation> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaViolation::at(key, "must be a string")),
        None => Err(SchemaViolation::at(key, "missing field")),
    }
}
