use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use tracing::{info, instrument};

use crate::domain::models::{Principal, Role};
use crate::pin::Pin;
use crate::server::AppState;
use crate::server::errors::AppError;

/// Resolves the `Authorization: Bearer` token and requires the admin role
fn admin_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::MissingToken)?;

    let principal = state.tokens.verify_token(token)?;
    if principal.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(principal)
}

#[instrument(skip_all)]
pub async fn list_pins(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Pin>>, AppError> {
    let principal = admin_principal(&state, &headers)?;
    let pins = state.pins.list_pins();
    info!(admin = %principal.id, count = pins.len(), "Listing pins");
    Ok(Json(pins))
}
