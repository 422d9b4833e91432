//! Agent message protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DesignStatus, SchemaViolation};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Role of messages only the assistant may produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantRole {
    #[default]
    Assistant,
}

/// Label of a catalog entry offered for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogLabel {
    Id(i64),
    Text(String),
}

impl std::fmt::Display for CatalogLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// One message exchanged between the agent and the user.
///
/// The set is closed: decoding fails for an unknown `type` tag or a
/// missing/mistyped field of a known one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Plain conversational text.
    Chat { role: ChatRole, content: String },

    /// Design preview produced by the agent.
    #[serde(rename_all = "camelCase")]
    Design {
        role: AssistantRole,
        image_url: String,
        message: String,
        status: DesignStatus,
        original_prompt: String,
        current_prompt: String,
    },

    /// Catalog selection prompt (blueprints, print providers, variants).
    #[serde(alias = "printify", rename_all = "camelCase")]
    Catalog {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blueprints: Option<Vec<CatalogLabel>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        print_providers: Option<Vec<CatalogLabel>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variants: Option<Vec<CatalogLabel>>,
    },
}

impl AgentMessage {
    /// Assistant chat message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Chat {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    /// User chat message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::Chat {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Wire tag of this variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Design { .. } => "design",
            Self::Catalog { .. } => "catalog",
        }
    }

    /// Strictly decode one message from an untyped JSON value.
    ///
    /// # Errors
    /// Returns a violation for a non-object, a missing or unknown `type`
    /// tag, or a missing/mistyped field.
    pub fn from_value(value: Value) -> Result<Self, SchemaViolation> {
        let Some(obj) = value.as_object() else {
            return Err(SchemaViolation::at("$", "message must be an object"));
        };
        match obj.get("type") {
            Some(Value::String(_)) => {}
            Some(_) => return Err(SchemaViolation::at("type", "tag must be a string")),
            None => return Err(SchemaViolation::at("type", "missing message tag")),
        }
        serde_json::from_value(value).map_err(|e| SchemaViolation::from_serde("$", &e))
    }
}

/// A message as seen by a consumer that tolerates newer variants.
///
/// Anything that does not decode as a known [`AgentMessage`] is kept as
/// raw JSON and renders as nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Known(AgentMessage),
    Unknown(Value),
}

impl From<AgentMessage> for IncomingMessage {
    fn from(msg: AgentMessage) -> Self {
        Self::Known(msg)
    }
}
