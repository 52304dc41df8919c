use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use tracing::instrument;

use crate::domain::models::{Principal, Token};
use crate::server::AppState;
use crate::server::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[instrument(skip_all)]
pub async fn verify_token(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<Principal>, AppError> {
    let Json(request) = body?;
    Ok(Json(state.tokens.verify_token(&request.token)?))
}

#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Token>, AppError> {
    let Json(request) = body?;
    Ok(Json(state.tokens.refresh_token(&request.refresh_token)?))
}
