use axum::body::Bytes;
use axum::extract::State;
use tracing::instrument;

use crate::server::AppState;
use crate::server::responses::EnvelopeResponse;

/// One protocol exchange over plain HTTP
#[instrument(skip_all)]
pub async fn handle_session(State(state): State<AppState>, body: Bytes) -> EnvelopeResponse {
    EnvelopeResponse::new(state.controller.handle_http(&body).await)
}
