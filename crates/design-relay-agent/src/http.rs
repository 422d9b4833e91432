//! HTTP client for the downstream design agent.

use std::time::Duration;

use async_trait::async_trait;
use design_relay_core::{Agent, AgentError, AgentRequest};
use reqwest::Client;
use serde_json::Value;

/// Agent reached over HTTP: `POST <url>` with the request as JSON, reply as JSON.
///
/// Connection failures, timeouts and non-success statuses are reported as
/// [`AgentError::Unavailable`]; a body that is not JSON as
/// [`AgentError::Malformed`].
#[derive(Debug, Clone)]
pub struct HttpAgent {
    client: Client,
    url: String,
}

impl HttpAgent {
    /// Create a client for the agent at `url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Use an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Target endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Agent for HttpAgent {
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, AgentError> {
        tracing::debug!(url = %self.url, session_id = %request.session_id, "Calling agent");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::Unavailable(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Unavailable(format!(
                "agent returned HTTP {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AgentError::Unavailable(describe(&e)))?;

        serde_json::from_slice(&body).map_err(|e| AgentError::Malformed(e.to_string()))
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}
