//! Relay that threads session context through the downstream agent.

use design_relay_core::{
    Agent, AgentError, AgentReply, AgentRequest, ContextStore, RelayRequest, RelayResponse,
    SchemaViolation, SessionContext,
};
use serde::Deserialize;

use crate::SessionLocks;

/// Relay error. Every kind is terminal for the current turn.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),
    #[error("Downstream unavailable: {0}")]
    DownstreamUnavailable(String),
    #[error("Downstream malformed: {0}")]
    DownstreamMalformed(String),
}

impl RelayError {
    /// Whether the caller sent a bad request (as opposed to a downstream fault).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::SchemaViolation(_))
    }
}

impl From<AgentError> for RelayError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Unavailable(msg) => Self::DownstreamUnavailable(msg),
            AgentError::Malformed(msg) => Self::DownstreamMalformed(msg),
        }
    }
}

/// Which context is sent downstream when the client supplies one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextPrecedence {
    /// The client's explicit context wins over the stored one.
    #[default]
    Client,
    /// The stored context always wins; client context is ignored.
    Store,
}

/// Relay behaviour switches.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    #[serde(default)]
    pub context_precedence: ContextPrecedence,
    /// Run turns of one session one at a time, in arrival order.
    #[serde(default = "default_serialize_sessions")]
    pub serialize_sessions: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            context_precedence: ContextPrecedence::default(),
            serialize_sessions: default_serialize_sessions(),
        }
    }
}

const fn default_serialize_sessions() -> bool {
    true
}

/// Relay between clients and the downstream agent.
pub struct Relay<S, A>
where
    S: ContextStore,
    A: Agent,
{
    store: S,
    agent: A,
    settings: RelaySettings,
    locks: SessionLocks,
}

impl<S, A> Relay<S, A>
where
    S: ContextStore,
    A: Agent,
{
    /// Create a new relay.
    #[must_use]
    pub fn new(store: S, agent: A, settings: RelaySettings) -> Self {
        Self {
            store,
            agent,
            settings,
            locks: SessionLocks::new(),
        }
    }

    /// The backing context store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Run one turn.
    ///
    /// The store is written only after the agent replied and the reply
    /// validated; any failure leaves the previous context in place.
    ///
    /// # Errors
    /// Returns `SchemaViolation` for an invalid request (store and agent are
    /// not touched), `DownstreamUnavailable` if the agent could not be
    /// reached, and `DownstreamMalformed` if its reply breaks the protocol.
    pub async fn handle(&self, request: RelayRequest) -> Result<RelayResponse, RelayError> {
        request.validate()?;
        let RelayRequest {
            input,
            session_id,
            context,
        } = request;

        let _turn = if self.settings.serialize_sessions {
            Some(self.locks.acquire(&session_id).await)
        } else {
            None
        };

        let context = self.resolve_context(&session_id, context).await;
        let agent_request = AgentRequest {
            input,
            session_id,
            context,
        };

        let raw = self.agent.invoke(&agent_request).await.map_err(|e| {
            match &e {
                AgentError::Unavailable(msg) => tracing::warn!(
                    session_id = %agent_request.session_id,
                    "Agent call failed: {msg}"
                ),
                AgentError::Malformed(msg) => tracing::error!(
                    session_id = %agent_request.session_id,
                    "Agent contract drift, undecodable reply: {msg}"
                ),
            }
            RelayError::from(e)
        })?;

        let reply = AgentReply::from_value(raw).map_err(|violation| {
            tracing::error!(
                session_id = %agent_request.session_id,
                path = %violation.path,
                "Agent contract drift: {}",
                violation.reason
            );
            RelayError::DownstreamMalformed(violation.to_string())
        })?;

        let AgentRequest { session_id, .. } = agent_request;
        self.store.set(&session_id, reply.context.clone()).await;
        tracing::debug!(
            session_id = %session_id,
            messages = reply.messages.len(),
            "Turn completed"
        );

        Ok(RelayResponse {
            session_id,
            messages: reply.messages,
            context: Some(reply.context),
        })
    }

    async fn resolve_context(
        &self,
        session_id: &str,
        explicit: Option<SessionContext>,
    ) -> SessionContext {
        match (self.settings.context_precedence, explicit) {
            (ContextPrecedence::Client, Some(ctx)) => ctx,
            (ContextPrecedence::Client | ContextPrecedence::Store, _) => {
                self.store.get(session_id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use design_relay_core::{AgentMessage, DesignStatus};
    use serde_json::{Value, json};

    use super::*;
    use crate::storage::MemoryStore;

    /// Agent that replays scripted results and records what it was sent.
    #[derive(Default)]
    struct ScriptedAgent {
        replies: Mutex<VecDeque<Result<Value, AgentError>>>,
        seen: Mutex<Vec<AgentRequest>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedAgent {
        fn with(replies: Vec<Result<Value, AgentError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_context(&self) -> SessionContext {
            self.seen.lock().unwrap().last().unwrap().context.clone()
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        async fn invoke(&self, request: &AgentRequest) -> Result<Value, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Unavailable("script exhausted".into())))
        }
    }

    fn chat_reply(content: &str, context: Value) -> Result<Value, AgentError> {
        Ok(json!({
            "messages": [{"type": "chat", "role": "assistant", "content": content}],
            "context": context
        }))
    }

    fn relay(agent: ScriptedAgent) -> Relay<Arc<MemoryStore>, Arc<ScriptedAgent>> {
        Relay::new(
            Arc::new(MemoryStore::new()),
            Arc::new(agent),
            RelaySettings::default(),
        )
    }

    #[tokio::test]
    async fn test_coffee_mug_scenario() {
        let agent = Arc::new(ScriptedAgent::with(vec![
            chat_reply("What size mug?", json!({"last_prompt": "I want a coffee mug"})),
            chat_reply("11oz it is.", json!({"last_prompt": "11oz"})),
        ]));
        let store = Arc::new(MemoryStore::new());
        let relay = Relay::new(Arc::clone(&store), Arc::clone(&agent), RelaySettings::default());

        let first = relay
            .handle(RelayRequest::new("I want a coffee mug", "s1").with_context(SessionContext::default()))
            .await
            .unwrap();
        assert_eq!(first.session_id, "s1");
        assert_eq!(first.messages, vec![AgentMessage::assistant("What size mug?")]);
        assert_eq!(
            store.get("s1").await.last_prompt(),
            Some("I want a coffee mug")
        );

        relay.handle(RelayRequest::new("11oz", "s1")).await.unwrap();
        assert_eq!(
            agent.last_context().last_prompt(),
            Some("I want a coffee mug"),
            "follow-up without explicit context must load the stored one"
        );
        assert_eq!(store.get("s1").await.last_prompt(), Some("11oz"));
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let relay = relay(ScriptedAgent::with(vec![chat_reply("unused", json!({}))]));

        let bad_context: SessionContext =
            serde_json::from_value(json!({"selected_variant_ids": [1]})).unwrap();
        for request in [
            RelayRequest::new("hi", " "),
            RelayRequest::new("hi", "s1").with_context(bad_context),
        ] {
            let err = relay.handle(request).await.unwrap_err();
            assert!(err.is_client_error(), "{err}");
        }

        assert_eq!(relay.agent.calls(), 0);
        assert!(relay.store().is_empty());
    }

    #[tokio::test]
    async fn test_downstream_failures_preserve_context() {
        let relay = relay(ScriptedAgent::with(vec![
            chat_reply("ok", json!({"last_prompt": "shirt", "blueprint_id": 6})),
            Err(AgentError::Unavailable("connection refused".into())),
            Ok(json!({"messages": [{"type": "chat", "role": "assistant"}], "context": {}})),
            Ok(json!({"messages": [], "context": {"selected_variant_ids": [3]}})),
            Err(AgentError::Malformed("expected value at line 1".into())),
        ]));

        relay.handle(RelayRequest::new("shirt", "s1")).await.unwrap();
        let before = relay.store().get("s1").await;

        assert!(matches!(
            relay.handle(RelayRequest::new("x", "s1")).await,
            Err(RelayError::DownstreamUnavailable(_))
        ));
        for _ in 0..3 {
            assert!(matches!(
                relay.handle(RelayRequest::new("x", "s1")).await,
                Err(RelayError::DownstreamMalformed(_))
            ));
        }

        assert_eq!(relay.store().get("s1").await, before);
    }

    #[tokio::test]
    async fn test_approved_design_without_image_is_not_persisted() {
        let relay = relay(ScriptedAgent::with(vec![Ok(json!({
            "messages": [],
            "context": {"design": {
                "image_url": "",
                "status": "approved",
                "original_prompt": "robot",
                "current_prompt": "robot"
            }}
        }))]));

        let err = relay.handle(RelayRequest::new("approve", "s1")).await.unwrap_err();
        assert!(matches!(err, RelayError::DownstreamMalformed(ref m) if m.contains("design.image_url")));
        assert!(relay.store().is_empty());
    }

    #[tokio::test]
    async fn test_context_replaced_wholesale() {
        let relay = relay(ScriptedAgent::with(vec![
            chat_reply("a", json!({"last_prompt": "tee", "blueprint_id": 6, "selected_variant_ids": [12, 13]})),
            Ok(json!({
                "messages": [{
                    "type": "design", "role": "assistant", "imageUrl": "https://img/1.png",
                    "message": "Here's your design!", "status": "refining",
                    "originalPrompt": "robot", "currentPrompt": "robot"
                }],
                "context": {"design": {
                    "image_url": "https://img/1.png", "status": "refining",
                    "original_prompt": "robot", "current_prompt": "robot"
                }}
            })),
        ]));

        relay.handle(RelayRequest::new("tee", "s1")).await.unwrap();
        let second = relay.handle(RelayRequest::new("robot", "s1")).await.unwrap();

        let stored = relay.store().get("s1").await;
        assert_eq!(stored.blueprint_id(), None);
        assert_eq!(stored.selected_variant_ids(), None);
        assert_eq!(stored.last_prompt(), None);
        assert_eq!(stored.design().map(|d| d.status), Some(DesignStatus::Refining));
        assert_eq!(second.context, Some(stored));
    }

    #[tokio::test]
    async fn test_agent_context_passes_through_unchanged() {
        let agent_ctx = json!({
            "lastPrompt": "I want a coffee mug",
            "design": {
                "design_image_url": "https://img/1.png",
                "status": "refining",
                "original_prompt": "mug",
                "current_prompt": "mug"
            },
            "variant_ids": [3],
            "selected_variant_ids": [3],
            "blueprint_id": 68
        });
        let agent = Arc::new(ScriptedAgent::with(vec![
            chat_reply("What size mug?", agent_ctx.clone()),
            chat_reply("11oz it is.", json!({"lastPrompt": "11oz"})),
        ]));
        let relay = Relay::new(MemoryStore::new(), Arc::clone(&agent), RelaySettings::default());

        let first = relay.handle(RelayRequest::new("I want a coffee mug", "s1")).await.unwrap();
        assert_eq!(serde_json::to_value(first.context.unwrap()).unwrap(), agent_ctx);
        assert_eq!(serde_json::to_value(relay.store().get("s1").await).unwrap(), agent_ctx);

        relay.handle(RelayRequest::new("11oz", "s1")).await.unwrap();
        let forwarded = serde_json::to_value(&agent.seen.lock().unwrap()[1]).unwrap();
        assert_eq!(forwarded["context"], agent_ctx);
        assert_eq!(forwarded["context"]["lastPrompt"], "I want a coffee mug");
    }

    #[tokio::test]
    async fn test_context_precedence() {
        let stored_ctx = json!({"last_prompt": "from store"});
        let client_ctx = SessionContext::from_value(json!({"last_prompt": "from client"})).unwrap();

        for (precedence, expected) in [
            (ContextPrecedence::Client, "from client"),
            (ContextPrecedence::Store, "from store"),
        ] {
            let agent = Arc::new(ScriptedAgent::with(vec![
                chat_reply("1", stored_ctx.clone()),
                chat_reply("2", stored_ctx.clone()),
            ]));
            let relay = Relay::new(
                MemoryStore::new(),
                Arc::clone(&agent),
                RelaySettings {
                    context_precedence: precedence,
                    ..Default::default()
                },
            );

            relay.handle(RelayRequest::new("seed", "s1")).await.unwrap();
            relay
                .handle(RelayRequest::new("next", "s1").with_context(client_ctx.clone()))
                .await
                .unwrap();
            assert_eq!(agent.last_context().last_prompt(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_serialized_turns_see_previous_write() {
        let agent = Arc::new(ScriptedAgent {
            replies: Mutex::new(
                vec![
                    chat_reply("1", json!({"last_prompt": "one"})),
                    chat_reply("2", json!({"last_prompt": "two"})),
                ]
                .into(),
            ),
            delay: Some(Duration::from_millis(30)),
            ..Default::default()
        });
        let relay = Arc::new(Relay::new(
            MemoryStore::new(),
            Arc::clone(&agent),
            RelaySettings::default(),
        ));

        let (a, b) = futures::join!(
            relay.handle(RelayRequest::new("one", "s1")),
            relay.handle(RelayRequest::new("two", "s1")),
        );
        a.unwrap();
        b.unwrap();

        // The second turn must have been sent the first turn's stored context.
        let seen = agent.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].context, SessionContext::default());
        assert_eq!(seen[1].context.last_prompt(), Some("one"));
        drop(seen);
        assert_eq!(relay.store().get("s1").await.last_prompt(), Some("two"));
    }
}
