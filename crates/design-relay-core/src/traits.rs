//! Core traits for context storage and the downstream agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::{AgentRequest, SessionContext};

/// Trait for session context storage backends.
///
/// Each call is atomic with respect to other calls on the same key. The store
/// does not order concurrent turns of one session; that is the caller's job.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Get the context for a session, or the default context if none is stored.
    async fn get(&self, session_id: &str) -> SessionContext;

    /// Replace the context for a session. Last writer wins.
    async fn set(&self, session_id: &str, context: SessionContext);
}

#[async_trait]
impl<T: ContextStore + ?Sized> ContextStore for Arc<T> {
    async fn get(&self, session_id: &str) -> SessionContext {
        (**self).get(session_id).await
    }

    async fn set(&self, session_id: &str, context: SessionContext) {
        (**self).set(session_id, context).await;
    }
}

/// Downstream agent error.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not be reached or did not answer successfully.
    #[error("Agent unavailable: {0}")]
    Unavailable(String),
    /// The agent answered with something that is not JSON.
    #[error("Agent response malformed: {0}")]
    Malformed(String),
}

/// Trait for the downstream conversational agent.
///
/// Implementations return the raw reply; validating it against the message
/// protocol is the relay's responsibility.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Run one turn.
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, AgentError>;
}

#[async_trait]
impl<T: Agent + ?Sized> Agent for Arc<T> {
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, AgentError> {
        (**self).invoke(request).await
    }
}
