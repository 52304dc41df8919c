use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::instrument;

use crate::domain::models::Token;
use crate::pin::{PinIssued, PinRedemption, PinRequest};
use crate::server::AppState;
use crate::server::errors::AppError;

#[instrument(skip_all)]
pub async fn request_pin(
    State(state): State<AppState>,
    body: Result<Json<PinRequest>, JsonRejection>,
) -> Result<Json<PinIssued>, AppError> {
    let Json(request) = body?;
    Ok(Json(state.pins.request_pin(request).await?))
}

#[instrument(skip_all)]
pub async fn redeem_pin(
    State(state): State<AppState>,
    body: Result<Json<PinRedemption>, JsonRejection>,
) -> Result<Json<Token>, AppError> {
    let Json(redemption) = body?;
    Ok(Json(state.pins.redeem_pin(redemption).await?))
}
