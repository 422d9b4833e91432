//! Client adapter: builds requests, keeps the local history and context echo.

use async_trait::async_trait;
use design_relay_core::{IncomingMessage, RelayRequest, ResponseEnvelope, SessionContext};
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{AGENT_PATH, ErrorBody};

/// Response envelope as decoded by the client.
pub type ClientResponse = ResponseEnvelope<IncomingMessage>;

/// Client error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Relay rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid relay response: {0}")]
    Decode(String),
    #[error("Response for session {actual}, expected {expected}")]
    SessionMismatch { expected: String, actual: String },
}

/// Trait for carrying one request/response exchange to the relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Send a request and decode the relay's envelope.
    async fn exchange(&self, request: &RelayRequest) -> Result<ClientResponse, ClientError>;
}

/// Transport over HTTP to a running relay.
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelayClient {
    /// Create a client for the relay at `base_url` (e.g. `http://localhost:3001`).
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}{AGENT_PATH}", base_url.trim_end_matches('/')),
        }
    }

    /// Full URL of the turn endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for HttpRelayClient {
    async fn exchange(&self, request: &RelayRequest) -> Result<ClientResponse, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => match body.path {
                    Some(path) => format!("{} (at {path})", body.message),
                    None => body.message,
                },
                Err(_) => status.to_string(),
            };
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<ClientResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// One conversation as seen by the UI.
///
/// Owns the display history (messages are appended, never replaced) and the
/// local echo of the context that is sent with the next request. A failed
/// turn leaves both untouched.
pub struct Conversation<T> {
    transport: T,
    session_id: String,
    context: SessionContext,
    history: Vec<IncomingMessage>,
}

impl<T: RelayTransport> Conversation<T> {
    /// Start a conversation with a freshly generated session id.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_session_id(transport, Uuid::new_v4().to_string())
    }

    /// Resume a conversation under a known session id.
    #[must_use]
    pub fn with_session_id(transport: T, session_id: impl Into<String>) -> Self {
        Self {
            transport,
            session_id: session_id.into(),
            context: SessionContext::default(),
            history: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Context that will accompany the next request.
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Everything received so far, oldest first.
    pub fn history(&self) -> &[IncomingMessage] {
        &self.history
    }

    /// Send one user turn and return the messages it produced.
    ///
    /// # Errors
    /// Returns error if the relay is unreachable, rejects the request, or
    /// answers for a different session. History and context are unchanged.
    pub async fn send(&mut self, input: &str) -> Result<&[IncomingMessage], ClientError> {
        let request = RelayRequest::new(input, self.session_id.clone())
            .with_context(self.context.clone());
        let response = self.transport.exchange(&request).await?;

        if response.session_id != self.session_id {
            return Err(ClientError::SessionMismatch {
                expected: self.session_id.clone(),
                actual: response.session_id,
            });
        }

        let start = self.history.len();
        self.history.extend(response.messages);
        self.context = response.context.unwrap_or_default();
        Ok(&self.history[start..])
    }
}
