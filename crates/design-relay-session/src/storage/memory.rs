//! In-memory context storage.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use design_relay_core::{ContextStore, SessionContext};

/// In-memory storage implementation.
///
/// Useful for development and single-process deployments.
/// Entries live until the process exits; data is lost on restart.
#[derive(Debug)]
pub struct MemoryStore {
    contexts: RwLock<HashMap<String, SessionContext>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Number of sessions with a stored context.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no session has a stored context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn get(&self, session_id: &str) -> SessionContext {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn set(&self, session_id: &str, context: SessionContext) {
        self.contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_string(), context);
    }
}
