//! HTTP endpoint for the relay.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use design_relay_core::{Agent, ContextStore, RelayRequest, RelayResponse};
use design_relay_session::{Relay, RelayError};
use tower_http::trace::TraceLayer;

use crate::protocol::{AGENT_PATH, ErrorBody, HEALTH_PATH};

/// HTTP handler state.
pub struct RelayState<S, A>
where
    S: ContextStore,
    A: Agent,
{
    /// Shared relay.
    pub relay: Arc<Relay<S, A>>,
}

impl<S, A> Clone for RelayState<S, A>
where
    S: ContextStore,
    A: Agent,
{
    fn clone(&self) -> Self {
        Self {
            relay: Arc::clone(&self.relay),
        }
    }
}

/// Relay failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            RelayError::SchemaViolation(v) => {
                tracing::info!(path = %v.path, "Rejected request: {}", v.reason);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody::schema_violation(v.path, v.reason),
                )
            }
            // Already logged by the relay with the distinguishing detail.
            RelayError::DownstreamUnavailable(_) | RelayError::DownstreamMalformed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::agent_error())
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Turn handler.
///
/// The body is decoded by hand so that every shape error, including invalid
/// JSON, is answered with the same 400 schema-violation body.
pub async fn agent_handler<S, A>(
    State(state): State<RelayState<S, A>>,
    body: Bytes,
) -> Result<Json<RelayResponse>, ApiError>
where
    S: ContextStore + 'static,
    A: Agent + 'static,
{
    let request = RelayRequest::from_json(&body).map_err(RelayError::from)?;
    let response = state.relay.handle(request).await?;
    Ok(Json(response))
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Create the relay router.
///
/// # Example
/// ```ignore
/// let app = create_router(Arc::new(relay)).layer(CorsLayer::permissive());
/// ```
#[must_use]
pub fn create_router<S, A>(relay: Arc<Relay<S, A>>) -> Router
where
    S: ContextStore + 'static,
    A: Agent + 'static,
{
    Router::new()
        .route(AGENT_PATH, post(agent_handler::<S, A>))
        .route(HEALTH_PATH, get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(RelayState { relay })
}
