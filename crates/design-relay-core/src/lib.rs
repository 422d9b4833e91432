//! Core abstractions for the design relay.
//!
//! This crate provides the fundamental building blocks:
//! - `AgentMessage` - Closed, tagged set of agent message kinds
//! - `SessionContext` - Per-session conversation state
//! - Request/response envelopes with fail-closed validation
//! - `ContextStore` and `Agent` traits
//! - A lenient renderer for client-side display

pub mod context;
pub mod envelope;
pub mod message;
pub mod render;
pub mod traits;
pub mod violation;

pub use context::{DesignState, DesignStatus, SessionContext};
pub use envelope::{AgentReply, AgentRequest, RelayRequest, RelayResponse, ResponseEnvelope};
pub use message::{AgentMessage, AssistantRole, CatalogLabel, ChatRole, IncomingMessage};
pub use traits::{Agent, AgentError, ContextStore};
pub use violation::SchemaViolation;
